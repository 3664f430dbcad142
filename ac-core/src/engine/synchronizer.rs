//! Read-refresh and write-apply cycles
//!
//! The synchronizer is the only component that mutates the [`SettingStore`].
//!
//! # Refresh
//!
//! Reads for a batch run in parallel. At most one read per attribute is in
//! flight: a caller arriving while a read is running waits for that read and
//! shares its outcome. A failed read marks only its own attribute as failed
//! and keeps the last value.
//!
//! # Apply
//!
//! 1. Reject if the controls are unavailable.
//! 2. Validate the value (pure, no hardware access).
//! 3. Take the attribute's write lock; a second apply waits for the first.
//! 4. Check mode gating against the cached modes.
//! 5. Record the baseline, show the proposed value as pending, write.
//! 6. On failure restore the baseline, mark it failed and re-read the
//!    attribute. A successful re-read commits the true hardware value; the
//!    status stays `Failed` either way.
//!
//! A read issued before a write started or resolved never commits over it.
//!
//! Steps 3-6 run in a spawned task and finish even if the caller stops
//! waiting.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, trace, warn};

use crate::data::{
    check_mode_gate, validate, validate_charge_limit, validate_curve_point,
    validate_custom_fan_speed, validate_gpu_boost, AttributeId, ChargeMode, FanMode, Panel,
    SettingValue,
};
use crate::error::{AorusError, DriverError, Result};
use crate::hw::DriverPort;
use crate::report::{Reporter, Severity};
use crate::store::SettingStore;

/// Outcome shared by every caller waiting on one read
pub type ReadOutcome = std::result::Result<SettingValue, DriverError>;

/// Whether hardware controls can currently function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// Not probed yet
    Unknown,
    Available,
    Unavailable { reason: String },
}

impl Availability {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Availability::Unavailable { .. })
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Unknown => f.write_str("unknown"),
            Availability::Available => f.write_str("available"),
            Availability::Unavailable { reason } => write!(f, "unavailable: {}", reason),
        }
    }
}

/// One write and what it replaced
#[derive(Debug)]
struct SyncAttempt {
    attribute: AttributeId,
    previous: Option<SettingValue>,
    proposed: SettingValue,
    outcome: Option<std::result::Result<(), String>>,
}

/// A read in flight and the write generation it was issued at
struct InFlight {
    id: u64,
    generation: u64,
    receiver: watch::Receiver<Option<ReadOutcome>>,
}

struct Inner {
    driver: Arc<dyn DriverPort>,
    store: Arc<SettingStore>,
    reporter: Arc<dyn Reporter>,
    availability: Mutex<Availability>,
    in_flight: Mutex<HashMap<AttributeId, InFlight>>,
    next_read: AtomicU64,
    write_locks: Mutex<HashMap<AttributeId, Arc<AsyncMutex<()>>>>,
}

impl Inner {
    /// Join the in-flight read of an attribute, or start one
    ///
    /// A read issued before the latest write started or resolved is never
    /// joined; a fresh read is started instead.
    async fn refresh_one(self: &Arc<Self>, attribute: AttributeId) -> ReadOutcome {
        let mut receiver = {
            let mut in_flight = self.in_flight.lock();
            let generation = self.store.write_generation(attribute);
            match in_flight.get(&attribute) {
                Some(read) if read.generation == generation => {
                    trace!(attribute = %attribute, "Joining in-flight read");
                    read.receiver.clone()
                }
                _ => self.start_read(&mut in_flight, attribute, generation),
            }
        };

        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| {
            Err(DriverError::new(
                attribute.to_string(),
                "read task ended without a result",
            ))
        })
    }

    fn start_read(
        self: &Arc<Self>,
        in_flight: &mut HashMap<AttributeId, InFlight>,
        attribute: AttributeId,
        generation: u64,
    ) -> watch::Receiver<Option<ReadOutcome>> {
        let id = self.next_read.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = watch::channel(None);
        in_flight.insert(
            attribute,
            InFlight {
                id,
                generation,
                receiver: receiver.clone(),
            },
        );

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = inner.driver.read(attribute).await;
            let committed = match &outcome {
                Ok(value) => inner.store.apply_read(attribute, *value, generation),
                Err(e) => {
                    debug!(attribute = %attribute, error = %e, "Refresh failed");
                    inner
                        .store
                        .apply_read_failure(attribute, e.reason.clone(), generation)
                }
            };
            if !committed {
                debug!(attribute = %attribute, "Discarded read overtaken by a write");
            }

            {
                let mut in_flight = inner.in_flight.lock();
                if in_flight.get(&attribute).is_some_and(|read| read.id == id) {
                    in_flight.remove(&attribute);
                }
            }
            let _ = sender.send(Some(outcome));
        });
        receiver
    }

    fn write_lock(&self, attribute: AttributeId) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.write_locks.lock().entry(attribute).or_default())
    }

    fn unavailable_error(&self) -> Option<AorusError> {
        match &*self.availability.lock() {
            Availability::Unavailable { reason } => Some(AorusError::Unavailable(reason.clone())),
            _ => None,
        }
    }

    async fn apply_locked(self: Arc<Self>, attribute: AttributeId, value: SettingValue) -> Result<()> {
        let lock = self.write_lock(attribute);
        let _write = lock.lock().await;

        // Availability may have changed while waiting on the lock
        if let Some(err) = self.unavailable_error() {
            return Err(err);
        }
        check_mode_gate(attribute, self.store.fan_mode(), self.store.charge_mode())?;

        let mut attempt = SyncAttempt {
            attribute,
            previous: self.store.begin_write(attribute, value),
            proposed: value,
            outcome: None,
        };

        let result = self.driver.write(attribute, value).await;
        attempt.outcome = Some(result.clone().map_err(|e| e.reason));
        trace!(?attempt, "Write attempt finished");

        match result {
            Ok(()) => {
                self.store.apply_write_result(attribute, value, Ok(()));
                info!(attribute = %attribute, %value, "Applied setting");
                self.reporter.report(
                    &format!("{} set to {}", attribute, attempt.proposed),
                    Severity::Success,
                );
                Ok(())
            }
            Err(e) => {
                warn!(attribute = %attribute, error = %e, "Write failed, rolling back");
                self.store.rollback(attribute, attempt.previous);
                self.store
                    .apply_write_result(attribute, value, Err(e.reason.clone()));

                // The failed write bumped the generation, so this is a fresh read
                match self.refresh_one(attribute).await {
                    Ok(actual) => {
                        debug!(attribute = %attribute, %actual, "Re-synced after failed write");
                    }
                    Err(read_err) => {
                        debug!(attribute = %attribute, error = %read_err, "Re-sync failed");
                        self.store.rollback(attribute, attempt.previous);
                    }
                }
                // The re-read value stays, but the failure remains visible
                self.store
                    .apply_write_result(attribute, value, Err(e.reason.clone()));

                self.reporter.report(
                    &format!("Failed to set {}: {}", attribute, e.reason),
                    Severity::Error,
                );
                Err(AorusError::Driver(e))
            }
        }
    }
}

/// Mediates every read and write between callers and the driver
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<Inner>,
}

impl Synchronizer {
    pub fn new(
        driver: Arc<dyn DriverPort>,
        store: Arc<SettingStore>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                driver,
                store,
                reporter,
                availability: Mutex::new(Availability::Unknown),
                in_flight: Mutex::new(HashMap::new()),
                next_read: AtomicU64::new(0),
                write_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<SettingStore> {
        &self.inner.store
    }

    pub fn driver(&self) -> &Arc<dyn DriverPort> {
        &self.inner.driver
    }

    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.inner.reporter
    }

    pub fn availability(&self) -> Availability {
        self.inner.availability.lock().clone()
    }

    /// Replace the availability state, returning the previous one
    pub(crate) fn set_availability(&self, availability: Availability) -> Availability {
        std::mem::replace(&mut *self.inner.availability.lock(), availability)
    }

    // ------------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------------

    /// Refresh one attribute, sharing any read already in flight
    pub async fn refresh_attribute(&self, attribute: AttributeId) -> ReadOutcome {
        self.inner.refresh_one(attribute).await
    }

    /// Refresh a set of attributes in parallel
    ///
    /// Failures are isolated per attribute; results come back in input order.
    pub async fn refresh(&self, attributes: &[AttributeId]) -> Vec<(AttributeId, ReadOutcome)> {
        let handles: Vec<_> = attributes
            .iter()
            .map(|&attribute| {
                let inner = Arc::clone(&self.inner);
                (
                    attribute,
                    tokio::spawn(async move { inner.refresh_one(attribute).await }),
                )
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (attribute, handle) in handles {
            let outcome = handle.await.unwrap_or_else(|e| {
                Err(DriverError::new(attribute.to_string(), format!("read task failed: {}", e)))
            });
            results.push((attribute, outcome));
        }

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        debug!(total = results.len(), failed, "Refresh finished");
        results
    }

    pub async fn refresh_panel(&self, panel: Panel) -> Vec<(AttributeId, ReadOutcome)> {
        self.refresh(&panel.attributes()).await
    }

    pub async fn refresh_all(&self) -> Vec<(AttributeId, ReadOutcome)> {
        self.refresh(&AttributeId::catalog()).await
    }

    // ------------------------------------------------------------------------
    // Apply
    // ------------------------------------------------------------------------

    /// Validate and write one attribute
    pub async fn apply(&self, attribute: AttributeId, value: SettingValue) -> Result<()> {
        if let Some(err) = self.inner.unavailable_error() {
            debug!(attribute = %attribute, "Apply rejected, controls unavailable");
            return Err(err);
        }
        validate(attribute, &value)?;

        let inner = Arc::clone(&self.inner);
        tokio::spawn(inner.apply_locked(attribute, value))
            .await
            .map_err(|e| AorusError::generic(format!("apply task failed: {}", e)))?
    }

    pub async fn set_fan_mode(&self, mode: FanMode) -> Result<()> {
        self.apply(AttributeId::FanMode, SettingValue::FanMode(mode))
            .await
    }

    /// Custom fan speed, already a multiple of 5
    pub async fn set_fan_custom_speed(&self, speed: i64) -> Result<()> {
        let speed = validate_custom_fan_speed(speed)?;
        self.apply(AttributeId::FanCustomSpeed, SettingValue::FanCustomSpeed(speed))
            .await
    }

    pub async fn set_charge_mode(&self, mode: ChargeMode) -> Result<()> {
        self.apply(AttributeId::ChargeMode, SettingValue::ChargeMode(mode))
            .await
    }

    pub async fn set_charge_limit(&self, limit: i64) -> Result<()> {
        let limit = validate_charge_limit(limit)?;
        self.apply(AttributeId::ChargeLimit, SettingValue::ChargeLimit(limit))
            .await
    }

    pub async fn set_gpu_boost(&self, mode: i64) -> Result<()> {
        let mode = validate_gpu_boost(mode)?;
        self.apply(AttributeId::GpuBoost, SettingValue::GpuBoost(mode))
            .await
    }

    pub async fn set_curve_point(&self, index: usize, temperature: i64, speed: i64) -> Result<()> {
        let (index, point) = validate_curve_point(index, temperature, speed)?;
        self.apply(AttributeId::FanCurvePoint(index), SettingValue::CurvePoint(point))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CurvePoint;
    use crate::error::ValidationError;
    use crate::hw::MemoryDriver;
    use crate::report::{MockReporter, NullReporter};
    use crate::store::SyncStatus;
    use std::time::Duration;

    fn setup(driver: &Arc<MemoryDriver>) -> Synchronizer {
        Synchronizer::new(
            driver.clone(),
            Arc::new(SettingStore::new()),
            Arc::new(NullReporter),
        )
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_read() {
        let driver = Arc::new(MemoryDriver::simulated());
        driver.set_latency(Duration::from_millis(20));
        let sync = setup(&driver);

        let (a, b) = tokio::join!(
            sync.refresh_attribute(AttributeId::FanMode),
            sync.refresh_attribute(AttributeId::FanMode)
        );
        assert_eq!(a, b);
        assert_eq!(driver.read_count(AttributeId::FanMode), 1);

        // A later refresh reads again
        sync.refresh_attribute(AttributeId::FanMode).await.unwrap();
        assert_eq!(driver.read_count(AttributeId::FanMode), 2);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_isolated() {
        let driver = Arc::new(MemoryDriver::simulated());
        let sync = setup(&driver);
        sync.refresh_panel(Panel::Power).await;

        driver.fail_reads(AttributeId::ChargeLimit, 1, "EIO");
        let results = sync.refresh_panel(Panel::Power).await;
        assert_eq!(results.len(), 3);
        assert!(results[1].1.is_err());
        assert!(results[0].1.is_ok() && results[2].1.is_ok());

        let limit = sync.store().get(AttributeId::ChargeLimit);
        assert_eq!(limit.value, Some(SettingValue::ChargeLimit(80)));
        assert_eq!(limit.status, SyncStatus::Failed("EIO".into()));
        assert_eq!(sync.store().get(AttributeId::ChargeMode).status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_successful_apply_reports_once() {
        let driver = Arc::new(MemoryDriver::simulated());
        let mut reporter = MockReporter::new();
        reporter
            .expect_report()
            .withf(|message, severity| {
                *severity == Severity::Success && message.contains("gpu_boost")
            })
            .times(1)
            .return_const(());
        let sync = Synchronizer::new(
            driver.clone(),
            Arc::new(SettingStore::new()),
            Arc::new(reporter),
        );

        sync.set_gpu_boost(2).await.unwrap();
        let setting = sync.store().get(AttributeId::GpuBoost);
        assert_eq!(setting.value, Some(SettingValue::GpuBoost(2)));
        assert_eq!(setting.status, SyncStatus::Synced);
        assert_eq!(driver.value(AttributeId::GpuBoost), Some(SettingValue::GpuBoost(2)));
    }

    #[tokio::test]
    async fn test_validation_never_touches_hardware() {
        let driver = Arc::new(MemoryDriver::simulated());
        let sync = setup(&driver);
        sync.refresh_all().await;

        let err = sync.set_fan_custom_speed(27).await.unwrap_err();
        assert!(err.is_validation());
        let err = sync.set_curve_point(15, 50, 128).await.unwrap_err();
        assert!(matches!(
            err,
            AorusError::Validation(ValidationError::IndexOutOfBounds { index: 15, max: 14 })
        ));
        let err = sync
            .apply(AttributeId::BatteryCycle, SettingValue::BatteryCycle(0))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(driver.total_writes(), 0);
        assert_eq!(sync.store().get(AttributeId::FanCustomSpeed).status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_mode_gating_uses_cached_mode() {
        let driver = Arc::new(MemoryDriver::simulated());
        let sync = setup(&driver);

        // Unknown mode is refused
        let err = sync.set_fan_custom_speed(50).await.unwrap_err();
        assert!(matches!(
            err,
            AorusError::Validation(ValidationError::ModeNotApplicable { .. })
        ));

        sync.refresh_panel(Panel::Fan).await;
        assert!(sync.set_fan_custom_speed(50).await.is_err());

        sync.set_fan_mode(FanMode::Custom).await.unwrap();
        sync.set_fan_custom_speed(70).await.unwrap();
        assert_eq!(
            driver.value(AttributeId::FanCustomSpeed),
            Some(SettingValue::FanCustomSpeed(70))
        );
        assert_eq!(driver.write_count(AttributeId::FanCustomSpeed), 1);
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_to_hardware_value() {
        let driver = Arc::new(MemoryDriver::simulated());
        let sync = setup(&driver);
        sync.refresh_panel(Panel::Performance).await;

        driver.fail_writes(AttributeId::GpuBoost, 1, "EIO");
        let err = sync.set_gpu_boost(3).await.unwrap_err();
        assert!(matches!(err, AorusError::Driver(_)));

        // Re-read succeeded and the hardware still holds the old value
        let setting = sync.store().get(AttributeId::GpuBoost);
        assert_eq!(setting.value, Some(SettingValue::GpuBoost(0)));
        assert_eq!(setting.status, SyncStatus::Failed("EIO".into()));
        assert_eq!(driver.read_count(AttributeId::GpuBoost), 2);
    }

    #[tokio::test]
    async fn test_write_that_landed_is_committed_after_resync() {
        let driver = Arc::new(MemoryDriver::simulated());
        let sync = setup(&driver);
        sync.refresh_panel(Panel::Curve).await;

        driver.commit_then_fail_writes(AttributeId::FanCurvePoint(4), 1, "EBUSY");
        assert!(sync.set_curve_point(4, 55, 200).await.is_err());
        assert_eq!(
            sync.store().value(AttributeId::FanCurvePoint(4)),
            Some(SettingValue::CurvePoint(CurvePoint::new(55, 200)))
        );
    }

    /// Starts a refresh whose read samples the hardware before the next write
    async fn refresh_in_background(sync: &Synchronizer, attribute: AttributeId) -> tokio::task::JoinHandle<ReadOutcome> {
        let sync = sync.clone();
        let handle = tokio::spawn(async move { sync.refresh_attribute(attribute).await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_issued_before_write_does_not_overwrite_it() {
        let driver = Arc::new(MemoryDriver::simulated());
        driver.set_read_latency(Duration::from_millis(50));
        let sync = setup(&driver);

        let early = refresh_in_background(&sync, AttributeId::GpuBoost).await;
        sync.set_gpu_boost(3).await.unwrap();

        // A refresh after the write does not join the older read
        assert_eq!(
            sync.refresh_attribute(AttributeId::GpuBoost).await.unwrap(),
            SettingValue::GpuBoost(3)
        );
        assert_eq!(early.await.unwrap().unwrap(), SettingValue::GpuBoost(0));
        assert_eq!(driver.read_count(AttributeId::GpuBoost), 2);

        let setting = sync.store().get(AttributeId::GpuBoost);
        assert_eq!(setting.value, driver.value(AttributeId::GpuBoost));
        assert_eq!(setting.value, Some(SettingValue::GpuBoost(3)));
        assert_eq!(setting.status, SyncStatus::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_after_failed_write_reads_hardware_again() {
        let driver = Arc::new(MemoryDriver::simulated());
        driver.set_read_latency(Duration::from_millis(50));
        let sync = setup(&driver);

        let early = refresh_in_background(&sync, AttributeId::GpuBoost).await;
        driver.commit_then_fail_writes(AttributeId::GpuBoost, 1, "EBUSY");
        assert!(sync.set_gpu_boost(3).await.is_err());
        early.await.unwrap().unwrap();

        assert_eq!(driver.read_count(AttributeId::GpuBoost), 2);
        let setting = sync.store().get(AttributeId::GpuBoost);
        assert_eq!(setting.value, driver.value(AttributeId::GpuBoost));
        assert_eq!(setting.value, Some(SettingValue::GpuBoost(3)));
        assert_eq!(setting.status, SyncStatus::Failed("EBUSY".into()));
    }

    #[tokio::test]
    async fn test_failed_resync_keeps_baseline_as_failed() {
        let driver = Arc::new(MemoryDriver::simulated());
        let sync = setup(&driver);
        sync.refresh_panel(Panel::Power).await;
        sync.set_charge_mode(ChargeMode::Custom).await.unwrap();

        driver.fail_writes(AttributeId::ChargeLimit, 1, "EIO");
        driver.fail_reads(AttributeId::ChargeLimit, 1, "EACCES");
        assert!(sync.set_charge_limit(65).await.is_err());

        let setting = sync.store().get(AttributeId::ChargeLimit);
        assert_eq!(setting.value, Some(SettingValue::ChargeLimit(80)));
        assert_eq!(setting.status, SyncStatus::Failed("EIO".into()));
    }

    #[tokio::test]
    async fn test_applies_to_one_attribute_are_linearized() {
        let driver = Arc::new(MemoryDriver::simulated());
        driver.set_latency(Duration::from_millis(10));
        let sync = setup(&driver);

        let (first, second) = tokio::join!(sync.set_gpu_boost(1), sync.set_gpu_boost(3));
        first.unwrap();
        second.unwrap();
        assert_eq!(driver.write_count(AttributeId::GpuBoost), 2);
        assert_eq!(driver.value(AttributeId::GpuBoost), Some(SettingValue::GpuBoost(3)));
        assert_eq!(
            sync.store().value(AttributeId::GpuBoost),
            Some(SettingValue::GpuBoost(3))
        );
    }

    #[tokio::test]
    async fn test_unavailable_rejects_applies() {
        let driver = Arc::new(MemoryDriver::simulated());
        let sync = setup(&driver);
        sync.set_availability(Availability::Unavailable {
            reason: "Permission denied".into(),
        });

        let err = sync.set_gpu_boost(1).await.unwrap_err();
        assert!(matches!(err, AorusError::Unavailable(_)));
        assert_eq!(driver.total_writes(), 0);
    }
}
