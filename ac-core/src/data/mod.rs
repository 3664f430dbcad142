//! Data types, configuration, and validation modules
//!
//! Contains the attribute catalog, typed values and the write gate.

mod config;
mod types;
mod validation;

pub use config::{ControlConfig, DriverKind};
pub use types::{
    AttributeId, ChargeMode, CurvePoint, Domain, FanMode, Panel, SettingValue, SystemInfo,
    ThermalLevel,
};
pub use validation::{
    check_mode_gate, describe_domain, quantize_fan_speed, validate, validate_charge_limit,
    validate_curve_index, validate_curve_point, validate_custom_fan_speed, validate_gpu_boost,
};
