//! Telemetry from the hwmon class directory
//!
//! Scans `hwmonN` directories in numeric order. Each chip may provide
//! `temp1_input`..`temp3_input` (millidegrees; CPU, GPU, motherboard) and
//! `fan1_input`..`fan2_input` (RPM; CPU, GPU). A later chip overrides values
//! read from an earlier one.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, trace};

use crate::constants::temperature;
use crate::data::SystemInfo;
use crate::error::{AorusError, Result};

fn read_value(path: &Path) -> Option<i32> {
    fs::read_to_string(path).ok()?.trim().parse::<i32>().ok()
}

/// List `hwmonN` directories sorted by N
fn hwmon_dirs(base: &Path) -> Result<Vec<PathBuf>> {
    let pattern = Regex::new(r"^hwmon(\d+)$").map_err(|e| AorusError::generic(e.to_string()))?;
    let entries = fs::read_dir(base).map_err(|e| AorusError::FileRead {
        path: base.to_path_buf(),
        source: e,
    })?;

    let mut dirs: Vec<(u32, PathBuf)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let index = pattern
                .captures(name.to_str()?)?
                .get(1)?
                .as_str()
                .parse::<u32>()
                .ok()?;
            Some((index, entry.path()))
        })
        .collect();
    dirs.sort_by_key(|(index, _)| *index);
    Ok(dirs.into_iter().map(|(_, path)| path).collect())
}

/// Where a driver reads telemetry from
#[derive(Debug, Clone)]
pub struct HwmonSource {
    base: PathBuf,
    chip: Option<String>,
}

impl HwmonSource {
    pub fn new(base: impl Into<PathBuf>, chip: Option<String>) -> Self {
        Self {
            base: base.into(),
            chip,
        }
    }

    /// Read one sample off the async runtime's worker threads
    pub async fn read(&self) -> Result<SystemInfo> {
        let base = self.base.clone();
        let chip = self.chip.clone();
        tokio::task::spawn_blocking(move || read_system_info(&base, chip.as_deref()))
            .await
            .map_err(|e| AorusError::generic(format!("telemetry task failed: {}", e)))?
    }
}

/// Read one telemetry sample
///
/// `chip` restricts the scan to chips whose `name` file matches. Fails when
/// the base directory cannot be read or no chip provides any value.
pub fn read_system_info(base: &Path, chip: Option<&str>) -> Result<SystemInfo> {
    let mut info = SystemInfo::default();
    let mut found = false;

    for dir in hwmon_dirs(base)? {
        if let Some(wanted) = chip {
            let name = fs::read_to_string(dir.join("name")).unwrap_or_default();
            if name.trim() != wanted {
                trace!(path = %dir.display(), "Skipping hwmon chip");
                continue;
            }
        }

        let temps = [
            &mut info.cpu_temp,
            &mut info.gpu_temp,
            &mut info.mb_temp,
        ];
        for (i, slot) in temps.into_iter().enumerate() {
            if let Some(milli) = read_value(&dir.join(format!("temp{}_input", i + 1))) {
                *slot = milli / temperature::MILLIDEGREE_DIVISOR;
                found = true;
            }
        }

        let fans = [&mut info.cpu_fan_rpm, &mut info.gpu_fan_rpm];
        for (i, slot) in fans.into_iter().enumerate() {
            if let Some(rpm) = read_value(&dir.join(format!("fan{}_input", i + 1))) {
                *slot = rpm;
                found = true;
            }
        }
    }

    if !found {
        return Err(AorusError::generic(format!(
            "no telemetry found under {}",
            base.display()
        )));
    }

    debug!(?info, "Read telemetry");
    Ok(info)
}
