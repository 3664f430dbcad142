//! AORUS Control Core Library
//!
//! Device control and synchronization for firmware settings exposed by the
//! AORUS laptop platform driver.
//!
//! # Features
//!
//! - **Setting Store**: Cached value and sync status for every catalog attribute
//! - **Synchronizer**: Deduplicated refreshes, validated writes with rollback
//! - **Validation**: Pure per-attribute domain checks before any hardware access
//! - **Telemetry Poller**: Fixed-interval refresh with failure-streak reporting
//! - **Availability Probe**: One-shot permission check that gates all writes
//! - **Drivers**: Direct sysfs, privileged helper, and a simulated platform
//!
//! # Module Structure
//!
//! - `hw/` - Driver port and implementations
//! - `data/` - Data types, configuration, validation
//! - `engine/` - Synchronizer, poller, probe, fan curve
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ac_core::{MemoryDriver, SettingStore, Synchronizer, TracingReporter, FanMode};
//!
//! # async fn demo() -> ac_core::Result<()> {
//! let sync = Synchronizer::new(
//!     Arc::new(MemoryDriver::simulated()),
//!     Arc::new(SettingStore::new()),
//!     Arc::new(TracingReporter),
//! );
//! sync.refresh_all().await;
//! sync.set_fan_mode(FanMode::Silent).await?;
//! # Ok(())
//! # }
//! ```

// Grouped modules
pub mod data;
pub mod engine;
pub mod hw;

// Standalone modules
pub mod constants;
pub mod error;
pub mod report;
pub mod store;

// Re-export primary types from data/
pub use data::{
    AttributeId, ChargeMode, ControlConfig, CurvePoint, Domain, DriverKind, FanMode, Panel,
    SettingValue, SystemInfo, ThermalLevel,
};

// Re-export validation functions from data/
pub use data::{
    check_mode_gate, describe_domain, quantize_fan_speed, validate, validate_charge_limit,
    validate_curve_index, validate_curve_point, validate_custom_fan_speed, validate_gpu_boost,
};

// Re-export error types
pub use error::{AorusError, DriverError, Result, ValidationError};

// Re-export engine types
pub use engine::{
    remediation, Availability, AvailabilityProbe, CurveAxis, CurveWarning, FanCurve,
    PollerState, ReadOutcome, Synchronizer, TelemetryPoller,
};

// Re-export hardware types from hw/
pub use hw::{
    driver_from_config, read_node_file, read_system_info, write_node_file, DriverPort,
    HelperDriver, HwmonSource, MemoryDriver, SysfsDriver,
};

pub use report::{NullReporter, Reporter, Severity, TracingReporter};
pub use store::{Setting, SettingStore, SyncStatus};
