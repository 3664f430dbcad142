//! Input validation for attribute writes
//!
//! Every function here is pure: no I/O, no shared state. The synchronizer runs
//! these before any hardware access, so a rejected value never reaches the
//! driver.
//!
//! Rounding a slider position to the nearest fan speed step is a caller-side
//! convenience ([`quantize_fan_speed`]); the gate itself rejects misaligned
//! speeds.

use crate::constants::{curve, domain};
use crate::data::types::{AttributeId, ChargeMode, CurvePoint, Domain, FanMode, SettingValue};
use crate::error::ValidationError;

fn check_range(attribute: AttributeId, value: i64, min: i64, max: i64) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            attribute: attribute.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Validates a custom fan speed: 25-100 in steps of 5
pub fn validate_custom_fan_speed(value: i64) -> Result<u8, ValidationError> {
    let attribute = AttributeId::FanCustomSpeed;
    check_range(
        attribute,
        value,
        domain::FAN_SPEED_MIN as i64,
        domain::FAN_SPEED_MAX as i64,
    )?;
    let step = domain::FAN_SPEED_STEP as i64;
    if value % step != 0 {
        return Err(ValidationError::StepMismatch {
            attribute: attribute.to_string(),
            value,
            step,
        });
    }
    Ok(value as u8)
}

/// Validates a charge limit: 60-100
pub fn validate_charge_limit(value: i64) -> Result<u8, ValidationError> {
    check_range(
        AttributeId::ChargeLimit,
        value,
        domain::CHARGE_LIMIT_MIN as i64,
        domain::CHARGE_LIMIT_MAX as i64,
    )?;
    Ok(value as u8)
}

/// Validates a GPU boost mode: 0-3
pub fn validate_gpu_boost(value: i64) -> Result<u8, ValidationError> {
    check_range(AttributeId::GpuBoost, value, 0, domain::GPU_BOOST_MAX as i64)?;
    Ok(value as u8)
}

/// Validates a fan curve table index: 0-14
pub fn validate_curve_index(index: usize) -> Result<u8, ValidationError> {
    if index > curve::MAX_INDEX {
        return Err(ValidationError::IndexOutOfBounds {
            index,
            max: curve::MAX_INDEX,
        });
    }
    Ok(index as u8)
}

/// Validates one fan curve point write
///
/// Temperature and speed are checked independently of each other and of the
/// neighbouring points.
pub fn validate_curve_point(
    index: usize,
    temperature: i64,
    speed: i64,
) -> Result<(u8, CurvePoint), ValidationError> {
    let index = validate_curve_index(index)?;
    let attribute = AttributeId::FanCurvePoint(index);
    check_range(attribute, temperature, 0, curve::MAX_TEMPERATURE as i64)?;
    check_range(attribute, speed, 0, curve::MAX_SPEED as i64)?;
    Ok((index, CurvePoint::new(temperature as u8, speed as u8)))
}

/// Rounds a raw slider value to the nearest fan speed step
///
/// The result may still be outside 25-100; the gate decides.
pub fn quantize_fan_speed(raw: i64) -> i64 {
    let step = domain::FAN_SPEED_STEP as i64;
    ((raw as f64 / step as f64).round() as i64) * step
}

/// Canonical write gate for an attribute/value pair
///
/// Checks writability, value kind and the attribute's domain. Mode gating
/// needs cached state and lives in [`check_mode_gate`].
pub fn validate(attribute: AttributeId, value: &SettingValue) -> Result<(), ValidationError> {
    if !attribute.is_writable() {
        return Err(ValidationError::ReadOnly(attribute.to_string()));
    }

    let mismatch = || ValidationError::TypeMismatch {
        attribute: attribute.to_string(),
        found: value.kind().to_string(),
    };

    match (attribute, value) {
        (AttributeId::FanMode, SettingValue::FanMode(_)) => Ok(()),
        (AttributeId::ChargeMode, SettingValue::ChargeMode(_)) => Ok(()),
        (AttributeId::FanCustomSpeed, SettingValue::FanCustomSpeed(speed)) => {
            validate_custom_fan_speed(*speed as i64).map(|_| ())
        }
        (AttributeId::ChargeLimit, SettingValue::ChargeLimit(limit)) => {
            validate_charge_limit(*limit as i64).map(|_| ())
        }
        (AttributeId::GpuBoost, SettingValue::GpuBoost(mode)) => {
            validate_gpu_boost(*mode as i64).map(|_| ())
        }
        (AttributeId::FanCurvePoint(index), SettingValue::CurvePoint(point)) => {
            validate_curve_point(index as usize, point.temperature as i64, point.speed as i64)
                .map(|_| ())
        }
        _ => Err(mismatch()),
    }
}

/// Rejects writes whose effect depends on a mode that is not active
///
/// `None` means the governing mode has never been read; the write is refused
/// because the gate cannot be confirmed.
pub fn check_mode_gate(
    attribute: AttributeId,
    fan_mode: Option<FanMode>,
    charge_mode: Option<ChargeMode>,
) -> Result<(), ValidationError> {
    match attribute {
        AttributeId::FanCustomSpeed => match fan_mode {
            Some(mode) if mode.allows_custom_speed() => Ok(()),
            Some(mode) => Err(ValidationError::ModeNotApplicable {
                attribute: attribute.to_string(),
                reason: format!("fan mode is {}; switch to Custom, Auto, or Fixed", mode),
            }),
            None => Err(ValidationError::ModeNotApplicable {
                attribute: attribute.to_string(),
                reason: "fan mode is unknown".to_string(),
            }),
        },
        AttributeId::ChargeLimit => match charge_mode {
            Some(ChargeMode::Custom) => Ok(()),
            Some(mode) => Err(ValidationError::ModeNotApplicable {
                attribute: attribute.to_string(),
                reason: format!("charge mode is {}; switch to Custom", mode),
            }),
            None => Err(ValidationError::ModeNotApplicable {
                attribute: attribute.to_string(),
                reason: "charge mode is unknown".to_string(),
            }),
        },
        _ => Ok(()),
    }
}

/// Human-readable description of an attribute domain, for CLI help
pub fn describe_domain(attribute: AttributeId) -> String {
    match attribute.domain() {
        Domain::Choice { max } => format!("0-{}", max),
        Domain::Range { min, max, step } if step > 1 => {
            format!("{}-{} (steps of {})", min, max, step)
        }
        Domain::Range { min, max, .. } => format!("{}-{}", min, max),
        Domain::CurvePoint {
            max_temperature,
            max_speed,
        } => format!("temperature 0-{}°C, speed 0-{}", max_temperature, max_speed),
        Domain::ReadOnly => "read-only".to_string(),
    }
}
