//! Driver backed by the privileged helper
//!
//! Every node access runs `<elevate> <helper> read|write <node> [value]`.
//! The helper prints the value on stdout, or `Error: ...` on stderr with a
//! non-zero exit code. When the process already runs as root the elevation
//! command is skipped.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::constants::timing;
use crate::data::{AttributeId, ControlConfig, SettingValue};
use crate::error::{AorusError, DriverError, Result};
use crate::hw::access::{self, NodeAccess};
use crate::hw::hwmon::HwmonSource;
use crate::hw::port::DriverPort;

fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

struct HelperNodes {
    helper: PathBuf,
    elevate: Option<String>,
}

impl HelperNodes {
    async fn run(&self, args: &[&str]) -> Result<String> {
        let mut command = match &self.elevate {
            Some(elevate) => {
                let mut command = Command::new(elevate);
                command.arg(&self.helper);
                command
            }
            None => Command::new(&self.helper),
        };
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        trace!(helper = %self.helper.display(), ?args, "Running helper");
        let output = tokio::time::timeout(timing::HELPER_TIMEOUT, command.output())
            .await
            .map_err(|_| AorusError::helper("helper timed out"))?
            .map_err(|e| AorusError::helper(format!("{}: {}", self.helper.display(), e)))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr.trim();
        let reason = reason.strip_prefix("Error:").map(str::trim).unwrap_or(reason);
        debug!(status = ?output.status.code(), reason, "Helper failed");
        if reason.is_empty() {
            Err(AorusError::helper(format!("helper exited with {}", output.status)))
        } else {
            Err(AorusError::helper(reason.to_string()))
        }
    }
}

#[async_trait]
impl NodeAccess for HelperNodes {
    async fn read_node(&self, node: &str) -> Result<String> {
        self.run(&["read", node]).await
    }

    async fn write_node(&self, node: &str, value: &str) -> Result<()> {
        self.run(&["write", node, value]).await.map(|_| ())
    }
}

/// Driver that goes through `aorus-helper`
pub struct HelperDriver {
    nodes: HelperNodes,
    hwmon: HwmonSource,
    curve_lock: Mutex<()>,
}

impl HelperDriver {
    /// `elevate` is skipped when running as root
    pub fn new(helper: impl Into<PathBuf>, elevate: impl Into<String>, hwmon: HwmonSource) -> Self {
        let elevate = Some(elevate.into()).filter(|_| !is_root());
        Self {
            nodes: HelperNodes {
                helper: helper.into(),
                elevate,
            },
            hwmon,
            curve_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &ControlConfig) -> Self {
        Self::new(
            config.helper_path.clone(),
            config.elevate_command.clone(),
            HwmonSource::new(config.hwmon_path.clone(), config.hwmon_chip.clone()),
        )
    }

    /// Run the helper's own permission check
    pub async fn check(&self) -> Result<()> {
        self.nodes.run(&["check"]).await.map(|_| ())
    }
}

#[async_trait]
impl DriverPort for HelperDriver {
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
        "helper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FanMode;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    const FAKE_HELPER: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
case "$1 $2" in
  "read fan_mode") echo 4 ;;
  "write gpu_boost") exit 0 ;;
  "check ") echo ok ;;
  *) echo "Error: Attribute '$2' not allowed" >&2; exit 1 ;;
esac
"#;

    #[tokio::test]
    async fn test_helper_protocol() {
        let dir = TempDir::new().unwrap();
        let helper = dir.path().join("aorus-helper");
        fs::write(&helper, FAKE_HELPER).unwrap();
        fs::set_permissions(&helper, fs::Permissions::from_mode(0o755)).unwrap();

        // `env` runs its argument unchanged, standing in for pkexec
        let driver = HelperDriver::new(&helper, "env", HwmonSource::new(dir.path(), None));

        assert_eq!(
            driver.read(AttributeId::FanMode).await.unwrap(),
            SettingValue::FanMode(FanMode::Auto)
        );
        driver
            .write(AttributeId::GpuBoost, SettingValue::GpuBoost(1))
            .await
            .unwrap();
        driver.check().await.unwrap();

        let err = driver.read(AttributeId::ChargeLimit).await.unwrap_err();
        assert_eq!(err.attribute, "charge_limit");
        assert!(err.reason.contains("not allowed"));
        assert!(!err.reason.contains("Error:"));

        let calls = fs::read_to_string(dir.path().join("calls.log")).unwrap();
        assert_eq!(
            calls.lines().collect::<Vec<_>>(),
            vec!["read fan_mode", "write gpu_boost 1", "check", "read charge_limit"]
        );
    }

    #[tokio::test]
    async fn test_missing_helper() {
        let dir = TempDir::new().unwrap();
        let driver = HelperDriver::new(
            dir.path().join("absent"),
            "env",
            HwmonSource::new(dir.path(), None),
        );
        assert!(driver.read(AttributeId::FanMode).await.is_err());
    }
}
