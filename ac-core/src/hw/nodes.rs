//! Platform node codec
//!
//! Maps catalog attributes to the text the platform driver reads and writes.
//! Enumerations and flags are decimal integers. A curve point spans two nodes:
//! `fan_curve_index` selects the point and `fan_curve_data` reads back as
//! `"<temperature> <speed>"` but is written as `speed * 256 + temperature`.
//!
//! The raw checks at the bottom guard the privileged helper, which only ever
//! sees node names and strings.

use crate::constants::{curve, domain, limits, nodes};
use crate::data::{AttributeId, ChargeMode, CurvePoint, FanMode, SettingValue};
use crate::error::{AorusError, Result};

fn parse_int<T: std::str::FromStr>(node: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| AorusError::parse(node, raw.trim(), e))
}

/// Decode the content of a single-node attribute
pub fn decode(attribute: AttributeId, raw: &str) -> Result<SettingValue> {
    let node = attribute
        .node()
        .ok_or_else(|| AorusError::UnknownAttribute(attribute.to_string()))?;

    let value = match attribute {
        AttributeId::FanMode => {
            let code: u8 = parse_int(node, raw)?;
            let mode = FanMode::try_from(code)
                .map_err(|code| AorusError::parse(node, code.to_string(), "unknown fan mode"))?;
            SettingValue::FanMode(mode)
        }
        AttributeId::FanCustomSpeed => SettingValue::FanCustomSpeed(parse_int(node, raw)?),
        AttributeId::ChargeMode => {
            let code: u8 = parse_int(node, raw)?;
            let mode = ChargeMode::try_from(code).map_err(|code| {
                AorusError::parse(node, code.to_string(), "unknown charge mode")
            })?;
            SettingValue::ChargeMode(mode)
        }
        AttributeId::ChargeLimit => SettingValue::ChargeLimit(parse_int(node, raw)?),
        AttributeId::BatteryCycle => SettingValue::BatteryCycle(parse_int(node, raw)?),
        AttributeId::GpuBoost => SettingValue::GpuBoost(parse_int(node, raw)?),
        AttributeId::UsbChargeS3 | AttributeId::UsbChargeS4 => {
            let flag: u8 = parse_int(node, raw)?;
            SettingValue::UsbCharge(flag != 0)
        }
        AttributeId::FanCurvePoint(_) | AttributeId::SystemInfo => {
            return Err(AorusError::UnknownAttribute(attribute.to_string()))
        }
    };
    Ok(value)
}

/// Encode a single-node value for writing
///
/// Returns the node name and its text.
pub fn encode(attribute: AttributeId, value: &SettingValue) -> Result<(&'static str, String)> {
    let node = attribute
        .node()
        .ok_or_else(|| AorusError::UnknownAttribute(attribute.to_string()))?;

    let text = match value {
        SettingValue::FanMode(mode) => (*mode as u8).to_string(),
        SettingValue::ChargeMode(mode) => (*mode as u8).to_string(),
        SettingValue::FanCustomSpeed(v) | SettingValue::ChargeLimit(v) | SettingValue::GpuBoost(v) => {
            v.to_string()
        }
        SettingValue::UsbCharge(flag) => u8::from(*flag).to_string(),
        SettingValue::BatteryCycle(v) => v.to_string(),
        SettingValue::CurvePoint(_) | SettingValue::SystemInfo(_) => {
            return Err(AorusError::generic(format!(
                "{} cannot be written through a single node",
                value.kind()
            )))
        }
    };
    Ok((node, text))
}

/// Decode `fan_curve_data` read back as `"<temperature> <speed>"`
pub fn decode_curve_data(raw: &str) -> Result<CurvePoint> {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    let [temperature, speed] = parts.as_slice() else {
        return Err(AorusError::parse(
            nodes::FAN_CURVE_DATA,
            raw.trim(),
            "expected '<temperature> <speed>'",
        ));
    };
    Ok(CurvePoint::new(
        parse_int(nodes::FAN_CURVE_DATA, temperature)?,
        parse_int(nodes::FAN_CURVE_DATA, speed)?,
    ))
}

/// Packed value written to `fan_curve_data`
pub fn encode_curve_data(point: CurvePoint) -> u16 {
    point.speed as u16 * curve::SPEED_SHIFT + point.temperature as u16
}

// ============================================================================
// Raw node checks (privileged helper)
// ============================================================================

/// Reject node names outside the platform allowlist
pub fn check_node_allowed(node: &str) -> Result<()> {
    if nodes::ALLOWED.contains(&node) {
        Ok(())
    } else {
        Err(AorusError::AttributeNotAllowed(node.to_string()))
    }
}

fn raw_in_range(node: &str, value: &str, max: u16, message: &str) -> Result<u16> {
    let parsed: u16 = value
        .parse()
        .map_err(|_| AorusError::parse(node, value, message))?;
    if parsed > max {
        return Err(AorusError::parse(node, value, message));
    }
    Ok(parsed)
}

/// Validate the raw text written to a node
pub fn validate_raw_value(node: &str, value: &str) -> Result<()> {
    check_node_allowed(node)?;
    if value.is_empty() || value.len() > limits::MAX_VALUE_LEN {
        return Err(AorusError::parse(node, value, "value length is invalid"));
    }

    match node {
        nodes::FAN_MODE => {
            raw_in_range(node, value, domain::FAN_MODE_MAX as u16, "fan_mode must be 0-5")?;
        }
        nodes::FAN_CUSTOM_SPEED => {
            let message = "fan_custom_speed must be 25-100 and divisible by 5";
            let speed = raw_in_range(node, value, domain::FAN_SPEED_MAX as u16, message)?;
            if speed < domain::FAN_SPEED_MIN as u16 || speed % domain::FAN_SPEED_STEP as u16 != 0 {
                return Err(AorusError::parse(node, value, message));
            }
        }
        nodes::CHARGE_MODE => {
            raw_in_range(node, value, domain::CHARGE_MODE_MAX as u16, "charge_mode must be 0-1")?;
        }
        nodes::CHARGE_LIMIT => {
            let message = "charge_limit must be 60-100";
            let limit = raw_in_range(node, value, domain::CHARGE_LIMIT_MAX as u16, message)?;
            if limit < domain::CHARGE_LIMIT_MIN as u16 {
                return Err(AorusError::parse(node, value, message));
            }
        }
        nodes::GPU_BOOST => {
            raw_in_range(node, value, domain::GPU_BOOST_MAX as u16, "gpu_boost must be 0-3")?;
        }
        nodes::USB_CHARGE_S3 | nodes::USB_CHARGE_S4 => {
            raw_in_range(node, value, 1, "must be 0 or 1")?;
        }
        nodes::FAN_CURVE_INDEX => {
            raw_in_range(node, value, curve::MAX_INDEX as u16, "fan_curve_index must be 0-14")?;
        }
        nodes::FAN_CURVE_DATA => {
            raw_in_range(node, value, u16::MAX, "fan_curve_data must be a valid 16-bit number")?;
        }
        _ => {
            return Err(AorusError::AttributeNotAllowed(format!(
                "{} is not writable",
                node
            )))
        }
    }
    Ok(())
}
