//! Direct platform node access
//!
//! Reads and writes the attribute files below the platform directory. Writing
//! requires permission on the nodes; without it the availability probe still
//! succeeds (reads are world-readable) but applies fail with the OS error.
//!
//! The blocking file functions are public so the privileged helper can share
//! them.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::data::{AttributeId, ControlConfig, SettingValue};
use crate::error::{AorusError, DriverError, Result};
use crate::hw::access::{self, NodeAccess};
use crate::hw::hwmon::HwmonSource;
use crate::hw::nodes as codec;
use crate::hw::port::DriverPort;

/// Read a platform node, trimmed
///
/// The node name must be on the allowlist.
pub fn read_node_file(base: &Path, node: &str) -> Result<String> {
    codec::check_node_allowed(node)?;
    let path = base.join(node);
    fs::read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| AorusError::FileRead { path, source: e })
}

/// Write a platform node
///
/// The node name and raw value must pass the allowlist rules.
pub fn write_node_file(base: &Path, node: &str, value: &str) -> Result<()> {
    codec::validate_raw_value(node, value)?;
    let path = base.join(node);
    fs::write(&path, value).map_err(|e| AorusError::FileWrite { path, source: e })
}

struct SysfsNodes {
    base: PathBuf,
}

#[async_trait]
impl NodeAccess for SysfsNodes {
    async fn read_node(&self, node: &str) -> Result<String> {
        let base = self.base.clone();
        let node = node.to_string();
        tokio::task::spawn_blocking(move || read_node_file(&base, &node))
            .await
            .map_err(|e| AorusError::generic(format!("node read task failed: {}", e)))?
    }

    async fn write_node(&self, node: &str, value: &str) -> Result<()> {
        let base = self.base.clone();
        let node = node.to_string();
        let value = value.to_string();
        tokio::task::spawn_blocking(move || write_node_file(&base, &node, &value))
            .await
            .map_err(|e| AorusError::generic(format!("node write task failed: {}", e)))?
    }
}

/// Driver that talks to the platform nodes directly
pub struct SysfsDriver {
    nodes: SysfsNodes,
    hwmon: HwmonSource,
    curve_lock: Mutex<()>,
}

impl SysfsDriver {
    pub fn new(platform_path: impl Into<PathBuf>, hwmon: HwmonSource) -> Self {
        Self {
            nodes: SysfsNodes {
                base: platform_path.into(),
            },
            hwmon,
            curve_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &ControlConfig) -> Self {
        Self::new(
            config.platform_path.clone(),
            HwmonSource::new(config.hwmon_path.clone(), config.hwmon_chip.clone()),
        )
    }

    pub fn platform_path(&self) -> &Path {
        &self.nodes.base
    }
}

#[async_trait]
impl DriverPort for SysfsDriver {
    async fn read(&self, attribute: AttributeId) -> std::result::Result<SettingValue, DriverError> {
        access::read_attribute(&self.nodes, &self.curve_lock, &self.hwmon, attribute).await
    }

    async fn write(
        &self,
        attribute: AttributeId,
        value: SettingValue,
    ) -> std::result::Result<(), DriverError> {
        access::write_attribute(&self.nodes, &self.curve_lock, attribute, value).await
    }

    fn name(&self) -> &'static str {
        "sysfs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CurvePoint, FanMode};
    use tempfile::TempDir;

    fn platform() -> TempDir {
        let dir = TempDir::new().unwrap();
        for (node, value) in [
            ("fan_mode", "0\n"),
            ("fan_custom_speed", "50\n"),
            ("charge_mode", "1\n"),
            ("charge_limit", "80\n"),
            ("battery_cycle", "17\n"),
            ("gpu_boost", "0\n"),
            ("usb_charge_s3_toggle", "1\n"),
            ("usb_charge_s4_toggle", "0\n"),
            ("fan_curve_index", "0\n"),
            ("fan_curve_data", "45 120\n"),
        ] {
            fs::write(dir.path().join(node), value).unwrap();
        }
        dir
    }

    fn hwmon(dir: &TempDir) -> HwmonSource {
        let base = dir.path().join("hwmon");
        fs::create_dir_all(base.join("hwmon0")).unwrap();
        fs::write(base.join("hwmon0").join("temp1_input"), "58000").unwrap();
        HwmonSource::new(base, None)
    }

    #[test]
    fn test_node_files_respect_allowlist() {
        let dir = platform();
        assert_eq!(read_node_file(dir.path(), "charge_limit").unwrap(), "80");
        assert!(matches!(
            read_node_file(dir.path(), "../secret"),
            Err(AorusError::AttributeNotAllowed(_))
        ));
        assert!(write_node_file(dir.path(), "charge_limit", "59").is_err());
        assert!(write_node_file(dir.path(), "battery_cycle", "0").is_err());
        write_node_file(dir.path(), "charge_limit", "61").unwrap();
        assert_eq!(read_node_file(dir.path(), "charge_limit").unwrap(), "61");
    }

    #[tokio::test]
    async fn test_driver_reads_catalog() {
        let dir = platform();
        let driver = SysfsDriver::new(dir.path(), hwmon(&dir));

        assert_eq!(
            driver.read(AttributeId::FanMode).await.unwrap(),
            SettingValue::FanMode(FanMode::Normal)
        );
        assert_eq!(
            driver.read(AttributeId::UsbChargeS3).await.unwrap(),
            SettingValue::UsbCharge(true)
        );
        assert_eq!(
            driver.read(AttributeId::FanCurvePoint(4)).await.unwrap(),
            SettingValue::CurvePoint(CurvePoint::new(45, 120))
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("fan_curve_index")).unwrap(),
            "4"
        );

        let info = driver.read(AttributeId::SystemInfo).await.unwrap();
        assert_eq!(info.as_system_info().map(|i| i.cpu_temp), Some(58));
    }

    #[tokio::test]
    async fn test_driver_writes() {
        let dir = platform();
        let driver = SysfsDriver::new(dir.path(), hwmon(&dir));

        driver
            .write(AttributeId::GpuBoost, SettingValue::GpuBoost(2))
            .await
            .unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("gpu_boost")).unwrap(), "2");

        driver
            .write(
                AttributeId::FanCurvePoint(14),
                SettingValue::CurvePoint(CurvePoint::new(50, 128)),
            )
            .await
            .unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("fan_curve_index")).unwrap(), "14");
        assert_eq!(fs::read_to_string(dir.path().join("fan_curve_data")).unwrap(), "32818");
    }

    #[tokio::test]
    async fn test_missing_platform_is_driver_error() {
        let dir = TempDir::new().unwrap();
        let driver = SysfsDriver::new(dir.path().join("aorus_laptop"), HwmonSource::new(dir.path(), None));
        let err = driver.read(AttributeId::FanMode).await.unwrap_err();
        assert_eq!(err.attribute, "fan_mode");
    }
}
