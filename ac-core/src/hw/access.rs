//! Shared attribute logic for node-backed drivers
//!
//! Both real drivers reduce every attribute to reads and writes of named
//! platform nodes. This module owns the mapping from attributes to node
//! sequences so that the drivers only move strings.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::constants::nodes;
use crate::data::{AttributeId, SettingValue};
use crate::error::{AorusError, DriverError, Result};
use crate::hw::hwmon::HwmonSource;
use crate::hw::nodes as codec;

/// Raw access to platform nodes
#[async_trait]
pub(crate) trait NodeAccess: Send + Sync {
    async fn read_node(&self, node: &str) -> Result<String>;
    async fn write_node(&self, node: &str, value: &str) -> Result<()>;
}

fn driver_error(attribute: AttributeId, err: AorusError) -> DriverError {
    DriverError::new(attribute.to_string(), err.to_string())
}

/// Read an attribute through node access
///
/// `curve_lock` serializes the index/data sequence of curve points so that a
/// concurrent access to another point cannot move the index in between.
pub(crate) async fn read_attribute(
    access: &dyn NodeAccess,
    curve_lock: &Mutex<()>,
    hwmon: &HwmonSource,
    attribute: AttributeId,
) -> std::result::Result<SettingValue, DriverError> {
    let result = match attribute {
        AttributeId::SystemInfo => hwmon.read().await.map(SettingValue::SystemInfo),
        AttributeId::FanCurvePoint(index) => {
            let _sequence = curve_lock.lock().await;
            async {
                access.write_node(nodes::FAN_CURVE_INDEX, &index.to_string()).await?;
                let raw = access.read_node(nodes::FAN_CURVE_DATA).await?;
                codec::decode_curve_data(&raw).map(SettingValue::CurvePoint)
            }
            .await
        }
        _ => match attribute.node() {
            Some(node) => match access.read_node(node).await {
                Ok(raw) => codec::decode(attribute, &raw),
                Err(e) => Err(e),
            },
            None => Err(AorusError::UnknownAttribute(attribute.to_string())),
        },
    };

    match &result {
        Ok(value) => trace!(attribute = %attribute, %value, "Read attribute"),
        Err(e) => debug!(attribute = %attribute, error = %e, "Attribute read failed"),
    }
    result.map_err(|e| driver_error(attribute, e))
}

/// Write an attribute through node access
pub(crate) async fn write_attribute(
    access: &dyn NodeAccess,
    curve_lock: &Mutex<()>,
    attribute: AttributeId,
    value: SettingValue,
) -> std::result::Result<(), DriverError> {
    let result = match (attribute, value) {
        (AttributeId::FanCurvePoint(index), SettingValue::CurvePoint(point)) => {
            let _sequence = curve_lock.lock().await;
            async {
                access.write_node(nodes::FAN_CURVE_INDEX, &index.to_string()).await?;
                let packed = codec::encode_curve_data(point);
                access.write_node(nodes::FAN_CURVE_DATA, &packed.to_string()).await
            }
            .await
        }
        _ => match codec::encode(attribute, &value) {
            Ok((node, text)) => access.write_node(node, &text).await,
            Err(e) => Err(e),
        },
    };

    match &result {
        Ok(()) => debug!(attribute = %attribute, %value, "Wrote attribute"),
        Err(e) => debug!(attribute = %attribute, error = %e, "Attribute write failed"),
    }
    result.map_err(|e| driver_error(attribute, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CurvePoint, FanMode};
    use parking_lot::Mutex as SyncMutex;
    use std::collections::HashMap;

    /// Node map that records every access in order
    #[derive(Default)]
    struct FakeNodes {
        values: SyncMutex<HashMap<String, String>>,
        log: SyncMutex<Vec<String>>,
    }

    #[async_trait]
    impl NodeAccess for FakeNodes {
        async fn read_node(&self, node: &str) -> Result<String> {
            self.log.lock().push(format!("read {}", node));
            self.values
                .lock()
                .get(node)
                .cloned()
                .ok_or_else(|| AorusError::generic("No such file or directory"))
        }

        async fn write_node(&self, node: &str, value: &str) -> Result<()> {
            self.log.lock().push(format!("write {} {}", node, value));
            self.values.lock().insert(node.to_string(), value.to_string());
            Ok(())
        }
    }

    fn hwmon() -> HwmonSource {
        HwmonSource::new("/nonexistent/hwmon", None)
    }

    #[tokio::test]
    async fn test_single_node_round_trip() {
        let fake = FakeNodes::default();
        let lock = Mutex::new(());
        write_attribute(&fake, &lock, AttributeId::FanMode, SettingValue::FanMode(FanMode::Silent))
            .await
            .unwrap();
        let value = read_attribute(&fake, &lock, &hwmon(), AttributeId::FanMode)
            .await
            .unwrap();
        assert_eq!(value, SettingValue::FanMode(FanMode::Silent));
    }

    #[tokio::test]
    async fn test_curve_sequences() {
        let fake = FakeNodes::default();
        let lock = Mutex::new(());
        write_attribute(
            &fake,
            &lock,
            AttributeId::FanCurvePoint(7),
            SettingValue::CurvePoint(CurvePoint::new(50, 128)),
        )
        .await
        .unwrap();

        fake.values
            .lock()
            .insert(nodes::FAN_CURVE_DATA.to_string(), "50 128".to_string());
        let value = read_attribute(&fake, &lock, &hwmon(), AttributeId::FanCurvePoint(7))
            .await
            .unwrap();
        assert_eq!(value, SettingValue::CurvePoint(CurvePoint::new(50, 128)));

        let log = fake.log.lock().clone();
        assert_eq!(
            log,
            vec![
                "write fan_curve_index 7",
                "write fan_curve_data 32818",
                "write fan_curve_index 7",
                "read fan_curve_data",
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_carry_attribute_and_reason() {
        let fake = FakeNodes::default();
        let lock = Mutex::new(());
        let err = read_attribute(&fake, &lock, &hwmon(), AttributeId::ChargeLimit)
            .await
            .unwrap_err();
        assert_eq!(err.attribute, "charge_limit");
        assert!(err.reason.contains("No such file"));

        let err = read_attribute(&fake, &lock, &hwmon(), AttributeId::SystemInfo)
            .await
            .unwrap_err();
        assert_eq!(err.attribute, "system_info");
    }
}
