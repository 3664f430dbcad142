//! Core data types for the firmware setting catalog
//!
//! Every controllable or observable value is addressed by an [`AttributeId`]
//! and carried as a [`SettingValue`]. The catalog is fixed; nothing here is
//! discovered at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::constants::{curve, domain, nodes, temperature};
use crate::data::validation::validate_curve_index;
use crate::error::{AorusError, Result};

/// Firmware fan operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FanMode {
    Normal = 0,
    Silent = 1,
    Gaming = 2,
    Custom = 3,
    Auto = 4,
    Fixed = 5,
}

impl FanMode {
    pub const ALL: [FanMode; 6] = [
        FanMode::Normal,
        FanMode::Silent,
        FanMode::Gaming,
        FanMode::Custom,
        FanMode::Auto,
        FanMode::Fixed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FanMode::Normal => "Normal",
            FanMode::Silent => "Silent",
            FanMode::Gaming => "Gaming",
            FanMode::Custom => "Custom",
            FanMode::Auto => "Auto",
            FanMode::Fixed => "Fixed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FanMode::Normal => "Balanced cooling and noise levels",
            FanMode::Silent => "Minimal fan noise, reduced cooling",
            FanMode::Gaming => "Maximum cooling performance",
            FanMode::Custom => "Use custom fan curve settings",
            FanMode::Auto => "Automatic speed adjustment based on temperature",
            FanMode::Fixed => "Fixed fan speed setting",
        }
    }

    /// Whether the custom fan speed takes effect in this mode
    pub fn allows_custom_speed(&self) -> bool {
        matches!(self, FanMode::Custom | FanMode::Auto | FanMode::Fixed)
    }
}

impl TryFrom<u8> for FanMode {
    type Error = u8;

    fn try_from(raw: u8) -> std::result::Result<Self, u8> {
        FanMode::ALL.get(raw as usize).copied().ok_or(raw)
    }
}

impl FromStr for FanMode {
    type Err = AorusError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(raw) = trimmed.parse::<u8>() {
            return FanMode::try_from(raw).map_err(|raw| {
                AorusError::parse(nodes::FAN_MODE, raw.to_string(), "fan mode must be 0-5")
            });
        }
        FanMode::ALL
            .iter()
            .find(|mode| mode.label().eq_ignore_ascii_case(trimmed))
            .copied()
            .ok_or_else(|| AorusError::parse(nodes::FAN_MODE, trimmed, "unknown fan mode"))
    }
}

impl fmt::Display for FanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Battery charging policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ChargeMode {
    Normal = 0,
    Custom = 1,
}

impl ChargeMode {
    pub fn label(&self) -> &'static str {
        match self {
            ChargeMode::Normal => "Normal",
            ChargeMode::Custom => "Custom",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChargeMode::Normal => "Battery will charge to 100% capacity",
            ChargeMode::Custom => {
                "Battery will stop charging at the set limit to preserve battery health"
            }
        }
    }
}

impl TryFrom<u8> for ChargeMode {
    type Error = u8;

    fn try_from(raw: u8) -> std::result::Result<Self, u8> {
        match raw {
            0 => Ok(ChargeMode::Normal),
            1 => Ok(ChargeMode::Custom),
            other => Err(other),
        }
    }
}

impl FromStr for ChargeMode {
    type Err = AorusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "normal" => Ok(ChargeMode::Normal),
            "1" | "custom" => Ok(ChargeMode::Custom),
            other => Err(AorusError::parse(
                nodes::CHARGE_MODE,
                other,
                "charge mode must be normal or custom",
            )),
        }
    }
}

impl fmt::Display for ChargeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry of the firmware fan curve table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Temperature in degrees Celsius (0-100)
    pub temperature: u8,
    /// Raw fan duty (0-255)
    pub speed: u8,
}

impl CurvePoint {
    pub fn new(temperature: u8, speed: u8) -> Self {
        Self { temperature, speed }
    }

    /// Speed as a rounded percentage of full duty
    pub fn speed_percent(&self) -> u8 {
        curve::speed_to_percent(self.speed)
    }
}

/// Live sensor readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub cpu_temp: i32,
    pub gpu_temp: i32,
    pub mb_temp: i32,
    pub cpu_fan_rpm: i32,
    pub gpu_fan_rpm: i32,
}

/// Coarse classification of a temperature reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThermalLevel {
    Normal,
    Warm,
    Hot,
    Critical,
}

impl ThermalLevel {
    pub fn classify(celsius: i32) -> Self {
        if celsius >= temperature::CRITICAL_THRESHOLD {
            ThermalLevel::Critical
        } else if celsius >= temperature::HOT_THRESHOLD {
            ThermalLevel::Hot
        } else if celsius >= temperature::WARM_THRESHOLD {
            ThermalLevel::Warm
        } else {
            ThermalLevel::Normal
        }
    }
}

/// Stable identifier of a catalog attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeId {
    FanMode,
    FanCustomSpeed,
    ChargeMode,
    ChargeLimit,
    BatteryCycle,
    GpuBoost,
    UsbChargeS3,
    UsbChargeS4,
    FanCurvePoint(u8),
    SystemInfo,
}

impl AttributeId {
    /// The full fixed catalog in display order
    pub fn catalog() -> Vec<AttributeId> {
        let mut all = vec![
            AttributeId::FanMode,
            AttributeId::FanCustomSpeed,
            AttributeId::ChargeMode,
            AttributeId::ChargeLimit,
            AttributeId::BatteryCycle,
            AttributeId::GpuBoost,
            AttributeId::UsbChargeS3,
            AttributeId::UsbChargeS4,
        ];
        all.extend(Self::curve_points());
        all.push(AttributeId::SystemInfo);
        all
    }

    /// All fan curve point attributes, index order
    pub fn curve_points() -> impl Iterator<Item = AttributeId> {
        (0..curve::POINT_COUNT as u8).map(AttributeId::FanCurvePoint)
    }

    /// Base name used in messages and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            AttributeId::FanMode => "fan_mode",
            AttributeId::FanCustomSpeed => "fan_custom_speed",
            AttributeId::ChargeMode => "charge_mode",
            AttributeId::ChargeLimit => "charge_limit",
            AttributeId::BatteryCycle => "battery_cycle",
            AttributeId::GpuBoost => "gpu_boost",
            AttributeId::UsbChargeS3 => "usb_charge_s3",
            AttributeId::UsbChargeS4 => "usb_charge_s4",
            AttributeId::FanCurvePoint(_) => "fan_curve_point",
            AttributeId::SystemInfo => "system_info",
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            AttributeId::FanMode
                | AttributeId::FanCustomSpeed
                | AttributeId::ChargeMode
                | AttributeId::ChargeLimit
                | AttributeId::GpuBoost
                | AttributeId::FanCurvePoint(_)
        )
    }

    pub fn domain(&self) -> Domain {
        match self {
            AttributeId::FanMode => Domain::Choice {
                max: domain::FAN_MODE_MAX,
            },
            AttributeId::FanCustomSpeed => Domain::Range {
                min: domain::FAN_SPEED_MIN,
                max: domain::FAN_SPEED_MAX,
                step: domain::FAN_SPEED_STEP,
            },
            AttributeId::ChargeMode => Domain::Choice {
                max: domain::CHARGE_MODE_MAX,
            },
            AttributeId::ChargeLimit => Domain::Range {
                min: domain::CHARGE_LIMIT_MIN,
                max: domain::CHARGE_LIMIT_MAX,
                step: 1,
            },
            AttributeId::GpuBoost => Domain::Choice {
                max: domain::GPU_BOOST_MAX,
            },
            AttributeId::FanCurvePoint(_) => Domain::CurvePoint {
                max_temperature: curve::MAX_TEMPERATURE,
                max_speed: curve::MAX_SPEED,
            },
            AttributeId::BatteryCycle
            | AttributeId::UsbChargeS3
            | AttributeId::UsbChargeS4
            | AttributeId::SystemInfo => Domain::ReadOnly,
        }
    }

    /// Sysfs node backing a single-node attribute
    ///
    /// Curve points span two nodes and telemetry lives in hwmon, so both
    /// return `None`.
    pub fn node(&self) -> Option<&'static str> {
        match self {
            AttributeId::FanMode => Some(nodes::FAN_MODE),
            AttributeId::FanCustomSpeed => Some(nodes::FAN_CUSTOM_SPEED),
            AttributeId::ChargeMode => Some(nodes::CHARGE_MODE),
            AttributeId::ChargeLimit => Some(nodes::CHARGE_LIMIT),
            AttributeId::BatteryCycle => Some(nodes::BATTERY_CYCLE),
            AttributeId::GpuBoost => Some(nodes::GPU_BOOST),
            AttributeId::UsbChargeS3 => Some(nodes::USB_CHARGE_S3),
            AttributeId::UsbChargeS4 => Some(nodes::USB_CHARGE_S4),
            AttributeId::FanCurvePoint(_) | AttributeId::SystemInfo => None,
        }
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeId::FanCurvePoint(index) => write!(f, "fan_curve_point[{}]", index),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for AttributeId {
    type Err = AorusError;

    /// Accepts catalog names, `fan_curve_point[N]` with N in 0-14, and the raw
    /// USB node names
    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        if let Some(rest) = name.strip_prefix("fan_curve_point") {
            let index = rest
                .strip_prefix('[')
                .and_then(|r| r.strip_suffix(']'))
                .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                .ok_or_else(|| AorusError::parse("fan_curve_point", rest, "expected fan_curve_point[N]"))?
                .parse::<usize>()
                .map_err(|e| AorusError::parse("fan_curve_point", rest, e))?;
            let index = validate_curve_index(index)?;
            return Ok(AttributeId::FanCurvePoint(index));
        }
        let id = match name {
            "fan_mode" => AttributeId::FanMode,
            "fan_custom_speed" => AttributeId::FanCustomSpeed,
            "charge_mode" => AttributeId::ChargeMode,
            "charge_limit" => AttributeId::ChargeLimit,
            "battery_cycle" => AttributeId::BatteryCycle,
            "gpu_boost" => AttributeId::GpuBoost,
            "usb_charge_s3" | "usb_charge_s3_toggle" => AttributeId::UsbChargeS3,
            "usb_charge_s4" | "usb_charge_s4_toggle" => AttributeId::UsbChargeS4,
            "system_info" => AttributeId::SystemInfo,
            other => return Err(AorusError::UnknownAttribute(other.to_string())),
        };
        Ok(id)
    }
}

impl Serialize for AttributeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Valid values of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Discrete values `0..=max`
    Choice { max: u8 },
    /// Integer range with a step
    Range { min: u8, max: u8, step: u8 },
    /// Independent temperature and speed bounds
    CurvePoint { max_temperature: u8, max_speed: u8 },
    /// Observable only
    ReadOnly,
}

/// A typed attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SettingValue {
    FanMode(FanMode),
    FanCustomSpeed(u8),
    ChargeMode(ChargeMode),
    ChargeLimit(u8),
    BatteryCycle(u32),
    GpuBoost(u8),
    UsbCharge(bool),
    CurvePoint(CurvePoint),
    SystemInfo(SystemInfo),
}

impl SettingValue {
    /// Short name of the value kind, for mismatch messages
    pub fn kind(&self) -> &'static str {
        match self {
            SettingValue::FanMode(_) => "fan mode",
            SettingValue::FanCustomSpeed(_) => "fan speed",
            SettingValue::ChargeMode(_) => "charge mode",
            SettingValue::ChargeLimit(_) => "charge limit",
            SettingValue::BatteryCycle(_) => "battery cycle",
            SettingValue::GpuBoost(_) => "gpu boost",
            SettingValue::UsbCharge(_) => "usb charge flag",
            SettingValue::CurvePoint(_) => "curve point",
            SettingValue::SystemInfo(_) => "system info",
        }
    }

    pub fn as_fan_mode(&self) -> Option<FanMode> {
        match self {
            SettingValue::FanMode(mode) => Some(*mode),
            _ => None,
        }
    }

    pub fn as_charge_mode(&self) -> Option<ChargeMode> {
        match self {
            SettingValue::ChargeMode(mode) => Some(*mode),
            _ => None,
        }
    }

    pub fn as_curve_point(&self) -> Option<CurvePoint> {
        match self {
            SettingValue::CurvePoint(point) => Some(*point),
            _ => None,
        }
    }

    pub fn as_system_info(&self) -> Option<SystemInfo> {
        match self {
            SettingValue::SystemInfo(info) => Some(*info),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::FanMode(mode) => write!(f, "{}", mode),
            SettingValue::FanCustomSpeed(speed) => write!(f, "{}%", speed),
            SettingValue::ChargeMode(mode) => write!(f, "{}", mode),
            SettingValue::ChargeLimit(limit) => write!(f, "{}%", limit),
            SettingValue::BatteryCycle(cycles) => write!(f, "{}", cycles),
            SettingValue::GpuBoost(0) => f.write_str("Disabled"),
            SettingValue::GpuBoost(mode) => write!(f, "Mode {}", mode),
            SettingValue::UsbCharge(true) => f.write_str("Enabled"),
            SettingValue::UsbCharge(false) => f.write_str("Disabled"),
            SettingValue::CurvePoint(point) => {
                write!(f, "{}°C -> {} ({}%)", point.temperature, point.speed, point.speed_percent())
            }
            SettingValue::SystemInfo(info) => write!(
                f,
                "CPU {}°C, GPU {}°C, MB {}°C, CPU fan {} RPM, GPU fan {} RPM",
                info.cpu_temp, info.gpu_temp, info.mb_temp, info.cpu_fan_rpm, info.gpu_fan_rpm
            ),
        }
    }
}

/// Attribute groups refreshed together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Fan,
    Power,
    Performance,
    Curve,
    Telemetry,
}

impl Panel {
    pub const ALL: [Panel; 5] = [
        Panel::Fan,
        Panel::Power,
        Panel::Performance,
        Panel::Curve,
        Panel::Telemetry,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Panel::Fan => "Fan Control",
            Panel::Power => "Power Management",
            Panel::Performance => "Performance",
            Panel::Curve => "Fan Curve",
            Panel::Telemetry => "System Information",
        }
    }

    /// The panel an attribute is loaded with
    pub fn of(attribute: AttributeId) -> Panel {
        match attribute {
            AttributeId::FanMode | AttributeId::FanCustomSpeed => Panel::Fan,
            AttributeId::ChargeMode | AttributeId::ChargeLimit | AttributeId::BatteryCycle => {
                Panel::Power
            }
            AttributeId::GpuBoost | AttributeId::UsbChargeS3 | AttributeId::UsbChargeS4 => {
                Panel::Performance
            }
            AttributeId::FanCurvePoint(_) => Panel::Curve,
            AttributeId::SystemInfo => Panel::Telemetry,
        }
    }

    pub fn attributes(&self) -> Vec<AttributeId> {
        match self {
            Panel::Fan => vec![AttributeId::FanMode, AttributeId::FanCustomSpeed],
            Panel::Power => vec![
                AttributeId::ChargeMode,
                AttributeId::ChargeLimit,
                AttributeId::BatteryCycle,
            ],
            Panel::Performance => vec![
                AttributeId::GpuBoost,
                AttributeId::UsbChargeS3,
                AttributeId::UsbChargeS4,
            ],
            Panel::Curve => AttributeId::curve_points().collect(),
            Panel::Telemetry => vec![AttributeId::SystemInfo],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_catalog_contents() {
        let catalog = AttributeId::catalog();
        assert_eq!(catalog.len(), 8 + curve::POINT_COUNT + 1);
        assert_eq!(catalog.first(), Some(&AttributeId::FanMode));
        assert_eq!(catalog.last(), Some(&AttributeId::SystemInfo));
        assert!(catalog.contains(&AttributeId::FanCurvePoint(14)));
        assert!(!catalog.contains(&AttributeId::FanCurvePoint(15)));
    }

    #[test]
    fn test_attribute_names_round_trip_through_display() {
        for id in AttributeId::catalog() {
            let parsed: AttributeId = id.to_string().parse().unwrap();
            assert_eq!(parsed, id);
        }
        assert_eq!(
            "usb_charge_s3_toggle".parse::<AttributeId>().unwrap(),
            AttributeId::UsbChargeS3
        );
        assert!("fan_speed".parse::<AttributeId>().is_err());
    }

    #[test]
    fn test_curve_point_names_are_strict() {
        assert_eq!(
            "fan_curve_point[14]".parse::<AttributeId>().unwrap(),
            AttributeId::FanCurvePoint(14)
        );
        for malformed in ["fan_curve_point7", "fan_curve_point[[7]]", "fan_curve_point[]", "fan_curve_point[+7]"] {
            assert!(
                matches!(malformed.parse::<AttributeId>(), Err(AorusError::Parse { .. })),
                "{} accepted",
                malformed
            );
        }
        assert!(matches!(
            "fan_curve_point[15]".parse::<AttributeId>(),
            Err(AorusError::Validation(ValidationError::IndexOutOfBounds { index: 15, max: 14 }))
        ));
        assert!("fan_curve_point[255]".parse::<AttributeId>().is_err());
    }

    #[test]
    fn test_fan_mode_parsing() {
        assert_eq!("gaming".parse::<FanMode>().unwrap(), FanMode::Gaming);
        assert_eq!("5".parse::<FanMode>().unwrap(), FanMode::Fixed);
        assert!("6".parse::<FanMode>().is_err());
        assert_eq!(FanMode::try_from(3), Ok(FanMode::Custom));
        assert_eq!(FanMode::try_from(9), Err(9));
    }

    #[test]
    fn test_custom_speed_modes() {
        let allowed: Vec<_> = FanMode::ALL
            .iter()
            .filter(|m| m.allows_custom_speed())
            .collect();
        assert_eq!(allowed, vec![&FanMode::Custom, &FanMode::Auto, &FanMode::Fixed]);
    }

    #[test]
    fn test_read_only_attributes() {
        assert!(!AttributeId::BatteryCycle.is_writable());
        assert!(!AttributeId::UsbChargeS4.is_writable());
        assert!(!AttributeId::SystemInfo.is_writable());
        assert_eq!(AttributeId::SystemInfo.domain(), Domain::ReadOnly);
        assert!(AttributeId::FanCurvePoint(3).is_writable());
    }

    #[test]
    fn test_speed_percent_and_thermal_levels() {
        assert_eq!(CurvePoint::new(50, 255).speed_percent(), 100);
        assert_eq!(CurvePoint::new(50, 128).speed_percent(), 50);
        assert_eq!(ThermalLevel::classify(59), ThermalLevel::Normal);
        assert_eq!(ThermalLevel::classify(60), ThermalLevel::Warm);
        assert_eq!(ThermalLevel::classify(75), ThermalLevel::Hot);
        assert_eq!(ThermalLevel::classify(80), ThermalLevel::Critical);
    }

    #[test]
    fn test_panels_cover_catalog_once() {
        let mut covered: Vec<AttributeId> = Panel::ALL.iter().flat_map(|p| p.attributes()).collect();
        covered.sort();
        let mut catalog = AttributeId::catalog();
        catalog.sort();
        assert_eq!(covered, catalog);

        for panel in Panel::ALL {
            for attribute in panel.attributes() {
                assert_eq!(Panel::of(attribute), panel);
            }
        }
    }

    #[test]
    fn test_value_display() {
        assert_eq!(SettingValue::GpuBoost(0).to_string(), "Disabled");
        assert_eq!(SettingValue::GpuBoost(2).to_string(), "Mode 2");
        assert_eq!(SettingValue::FanCustomSpeed(45).to_string(), "45%");
    }
}
