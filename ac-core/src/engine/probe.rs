//! Availability probe
//!
//! One harmless read of the fan mode decides whether hardware controls can
//! work under the current permissions. The result does not touch the setting
//! store. Permission problems and a missing driver look the same here.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::constants::paths;
use crate::data::AttributeId;
use crate::engine::synchronizer::{Availability, Synchronizer};
use crate::report::Severity;

/// Remediation text shown when the controls are unavailable
pub fn remediation(platform_path: &Path) -> String {
    format!(
        "Cannot access the AORUS laptop driver. Write permission on {path} is required. \
         Quick fix (temporary): sudo chmod -R 666 {path}/*. \
         For a permanent fix install the udev rule or the aorus-helper policy.",
        path = platform_path.display()
    )
}

/// One-shot capability check
pub struct AvailabilityProbe {
    sync: Synchronizer,
    platform_path: PathBuf,
}

impl AvailabilityProbe {
    pub fn new(sync: Synchronizer) -> Self {
        Self {
            sync,
            platform_path: PathBuf::from(paths::PLATFORM_BASE),
        }
    }

    /// Platform directory named in the remediation text
    pub fn with_platform_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.platform_path = path.into();
        self
    }

    /// Probe once and record the result on the synchronizer
    ///
    /// The remediation message is reported only on a transition into
    /// `Unavailable`. There is no automatic retry.
    pub async fn run(&self) -> Availability {
        let availability = match self.sync.driver().read(AttributeId::FanMode).await {
            Ok(_) => Availability::Available,
            Err(e) => {
                warn!(driver = self.sync.driver().name(), error = %e, "Hardware controls unavailable");
                Availability::Unavailable { reason: e.reason }
            }
        };

        let previous = self.sync.set_availability(availability.clone());
        match (&previous, &availability) {
            (Availability::Unavailable { .. }, Availability::Unavailable { .. }) => {}
            (_, Availability::Unavailable { .. }) => {
                self.sync
                    .reporter()
                    .report(&remediation(&self.platform_path), Severity::Error);
            }
            (Availability::Unavailable { .. }, Availability::Available) => {
                info!("Hardware controls available again");
            }
            _ => {}
        }
        availability
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AorusError;
    use crate::hw::MemoryDriver;
    use crate::report::MockReporter;
    use crate::store::{SettingStore, SyncStatus};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_probe_failure_blocks_applies() {
        let driver = Arc::new(MemoryDriver::simulated());
        driver.set_unavailable(Some("Permission denied".into()));

        let mut reporter = MockReporter::new();
        reporter
            .expect_report()
            .withf(|message, severity| {
                *severity == Severity::Error && message.contains("chmod")
            })
            .times(1)
            .return_const(());
        let sync = Synchronizer::new(driver.clone(), Arc::new(SettingStore::new()), Arc::new(reporter));
        let probe = AvailabilityProbe::new(sync.clone());

        let availability = probe.run().await;
        assert!(availability.is_unavailable());
        // A second failing probe is not a transition
        assert!(probe.run().await.is_unavailable());

        driver.set_unavailable(None);
        let err = sync.set_gpu_boost(1).await.unwrap_err();
        assert!(matches!(err, AorusError::Unavailable(_)));
        assert_eq!(driver.total_writes(), 0);
    }

    #[tokio::test]
    async fn test_probe_success_leaves_store_alone() {
        let driver = Arc::new(MemoryDriver::simulated());
        let mut reporter = MockReporter::new();
        reporter.expect_report().never();
        let sync = Synchronizer::new(driver.clone(), Arc::new(SettingStore::new()), Arc::new(reporter));

        assert_eq!(sync.availability(), Availability::Unknown);
        assert_eq!(AvailabilityProbe::new(sync.clone()).run().await, Availability::Available);
        assert_eq!(sync.availability(), Availability::Available);
        assert_eq!(sync.store().get(AttributeId::FanMode).status, SyncStatus::Unsynced);
    }
}
