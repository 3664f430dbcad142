//! Constants and configuration values for aorus-control
//!
//! Centralizes paths, attribute domains, timing and limits.
//! Other modules take their magic numbers from here.

use std::time::Duration;

/// System paths
pub mod paths {
    /// Directory holding the platform driver's attribute files
    pub const PLATFORM_BASE: &str = "/sys/devices/platform/aorus_laptop";

    /// Base path for hwmon devices (telemetry)
    pub const HWMON_BASE: &str = "/sys/class/hwmon";

    /// Installed location of the privileged helper
    pub const HELPER_PATH: &str = "/usr/lib/aorus-cc/aorus-helper";

    /// Command used to run the helper with elevated privileges
    pub const ELEVATE_COMMAND: &str = "pkexec";

    /// Name of the application directory under the user config dir
    pub const CONFIG_DIR_NAME: &str = "aorus-control";

    /// Configuration file name
    pub const CONFIG_FILE: &str = "config.json";

    /// Environment variable overriding the config file location
    pub const CONFIG_ENV: &str = "AORUS_CONTROL_CONFIG";

    /// Resolve the user configuration file path
    pub fn user_config_file() -> Option<std::path::PathBuf> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            if !explicit.trim().is_empty() {
                return Some(std::path::PathBuf::from(explicit));
            }
        }
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE))
    }
}

/// Sysfs node names exposed by the platform driver
pub mod nodes {
    pub const FAN_MODE: &str = "fan_mode";
    pub const FAN_CUSTOM_SPEED: &str = "fan_custom_speed";
    pub const CHARGE_MODE: &str = "charge_mode";
    pub const CHARGE_LIMIT: &str = "charge_limit";
    pub const BATTERY_CYCLE: &str = "battery_cycle";
    pub const GPU_BOOST: &str = "gpu_boost";
    pub const USB_CHARGE_S3: &str = "usb_charge_s3_toggle";
    pub const USB_CHARGE_S4: &str = "usb_charge_s4_toggle";
    pub const FAN_CURVE_INDEX: &str = "fan_curve_index";
    pub const FAN_CURVE_DATA: &str = "fan_curve_data";

    /// Every node the helper may touch
    pub const ALLOWED: &[&str] = &[
        FAN_MODE,
        FAN_CUSTOM_SPEED,
        CHARGE_MODE,
        CHARGE_LIMIT,
        GPU_BOOST,
        USB_CHARGE_S3,
        USB_CHARGE_S4,
        BATTERY_CYCLE,
        FAN_CURVE_INDEX,
        FAN_CURVE_DATA,
    ];
}

/// Attribute value domains
pub mod domain {
    /// Custom fan speed, percent
    pub const FAN_SPEED_MIN: u8 = 25;
    pub const FAN_SPEED_MAX: u8 = 100;
    pub const FAN_SPEED_STEP: u8 = 5;

    /// Battery charge limit, percent
    pub const CHARGE_LIMIT_MIN: u8 = 60;
    pub const CHARGE_LIMIT_MAX: u8 = 100;

    /// GPU boost modes 0..=3
    pub const GPU_BOOST_MAX: u8 = 3;

    /// Highest fan mode discriminant (Fixed)
    pub const FAN_MODE_MAX: u8 = 5;

    /// Highest charge mode discriminant (Custom)
    pub const CHARGE_MODE_MAX: u8 = 1;
}

/// Fan curve table constants
pub mod curve {
    /// Number of points in the firmware curve table
    pub const POINT_COUNT: usize = 15;

    /// Highest valid point index
    pub const MAX_INDEX: usize = POINT_COUNT - 1;

    /// Curve temperatures, Celsius
    pub const MAX_TEMPERATURE: u8 = 100;

    /// Curve speeds are raw duty values
    pub const MAX_SPEED: u8 = 255;

    /// `fan_curve_data` packs speed in the high byte
    pub const SPEED_SHIFT: u16 = 256;

    /// Convert a raw curve speed (0-255) to a rounded percentage
    #[inline]
    pub fn speed_to_percent(speed: u8) -> u8 {
        ((speed as f32 / MAX_SPEED as f32) * 100.0).round() as u8
    }
}

/// Temperature constants
pub mod temperature {
    /// hwmon temperatures are in millidegrees
    pub const MILLIDEGREE_DIVISOR: i32 = 1000;

    /// Thresholds used to classify telemetry readings, Celsius
    pub const WARM_THRESHOLD: i32 = 60;
    pub const HOT_THRESHOLD: i32 = 70;
    pub const CRITICAL_THRESHOLD: i32 = 80;
}

/// Timing constants for polling and helper invocation
pub mod timing {
    use super::*;

    /// Default telemetry refresh period
    pub const TELEMETRY_INTERVAL: Duration = Duration::from_millis(2000);

    /// Default telemetry refresh period in milliseconds (config default)
    pub const TELEMETRY_INTERVAL_MS: u64 = 2000;

    /// Lowest telemetry period accepted from configuration
    pub const MIN_TELEMETRY_INTERVAL_MS: u64 = 250;

    /// Upper bound on a single helper invocation
    pub const HELPER_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Security and resource limits
pub mod limits {
    /// Maximum config file size (64KB)
    pub const MAX_CONFIG_SIZE: u64 = 64 * 1024;

    /// Maximum length of a helper argument
    pub const MAX_VALUE_LEN: usize = 16;
}
