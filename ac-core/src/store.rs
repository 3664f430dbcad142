//! In-memory cache of every catalog attribute
//!
//! The store holds the last value and sync status of each attribute. Readers
//! may call it from anywhere; mutation is crate-private so that only the
//! synchronizer changes cached state. The lock is never held across an await.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;

use crate::constants::curve;
use crate::data::{AttributeId, ChargeMode, FanMode, SettingValue, SystemInfo};
use crate::engine::FanCurve;

/// Outcome of the most recent synchronization of an attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SyncStatus {
    /// Never read
    Unsynced,
    Synced,
    /// A write is in flight
    Pending,
    Failed(String),
}

impl SyncStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncStatus::Failed(_))
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Unsynced => f.write_str("unsynced"),
            SyncStatus::Synced => f.write_str("synced"),
            SyncStatus::Pending => f.write_str("pending"),
            SyncStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Cached state of one attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub attribute: AttributeId,
    pub value: Option<SettingValue>,
    pub status: SyncStatus,
}

impl Setting {
    fn unsynced(attribute: AttributeId) -> Self {
        Self {
            attribute,
            value: None,
            status: SyncStatus::Unsynced,
        }
    }
}

#[derive(Debug, Default)]
struct Entries {
    settings: HashMap<AttributeId, Setting>,
    /// Bumped when a write starts and when it resolves
    generations: HashMap<AttributeId, u64>,
}

impl Entries {
    fn setting_mut(&mut self, attribute: AttributeId) -> &mut Setting {
        self.settings
            .entry(attribute)
            .or_insert_with(|| Setting::unsynced(attribute))
    }

    fn generation(&self, attribute: AttributeId) -> u64 {
        self.generations.get(&attribute).copied().unwrap_or(0)
    }

    fn bump(&mut self, attribute: AttributeId) {
        *self.generations.entry(attribute).or_default() += 1;
    }

    /// A read may commit only if no write started or resolved since it began
    fn read_is_current(&self, attribute: AttributeId, since: u64) -> bool {
        self.generation(attribute) == since
            && self
                .settings
                .get(&attribute)
                .map_or(true, |s| s.status != SyncStatus::Pending)
    }
}

/// Cached state of the whole catalog
#[derive(Debug, Default)]
pub struct SettingStore {
    entries: Mutex<Entries>,
}

impl SettingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known value and status; an attribute never read is `Unsynced`
    pub fn get(&self, attribute: AttributeId) -> Setting {
        self.entries
            .lock()
            .settings
            .get(&attribute)
            .cloned()
            .unwrap_or_else(|| Setting::unsynced(attribute))
    }

    pub fn value(&self, attribute: AttributeId) -> Option<SettingValue> {
        self.entries.lock().settings.get(&attribute).and_then(|s| s.value)
    }

    /// Every catalog attribute, in catalog order
    pub fn snapshot(&self) -> Vec<Setting> {
        let entries = self.entries.lock();
        AttributeId::catalog()
            .into_iter()
            .map(|id| {
                entries
                    .settings
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| Setting::unsynced(id))
            })
            .collect()
    }

    pub fn fan_curve(&self) -> FanCurve {
        let entries = self.entries.lock();
        let mut fan_curve = FanCurve::default();
        for index in 0..curve::POINT_COUNT {
            let point = entries
                .settings
                .get(&AttributeId::FanCurvePoint(index as u8))
                .and_then(|s| s.value)
                .and_then(|v| v.as_curve_point());
            if let Some(point) = point {
                fan_curve.set(index, point);
            }
        }
        fan_curve
    }

    pub fn system_info(&self) -> Option<SystemInfo> {
        self.value(AttributeId::SystemInfo)
            .and_then(|v| v.as_system_info())
    }

    pub fn fan_mode(&self) -> Option<FanMode> {
        self.value(AttributeId::FanMode).and_then(|v| v.as_fan_mode())
    }

    pub fn charge_mode(&self) -> Option<ChargeMode> {
        self.value(AttributeId::ChargeMode)
            .and_then(|v| v.as_charge_mode())
    }

    // ------------------------------------------------------------------------
    // Mutation (synchronizer only)
    // ------------------------------------------------------------------------

    /// Write generation to capture before issuing a read
    pub(crate) fn write_generation(&self, attribute: AttributeId) -> u64 {
        self.entries.lock().generation(attribute)
    }

    /// Commits a read issued at generation `since`
    ///
    /// Returns `false` and changes nothing when a write started or resolved
    /// after the read was issued.
    pub(crate) fn apply_read(&self, attribute: AttributeId, value: SettingValue, since: u64) -> bool {
        let mut entries = self.entries.lock();
        if !entries.read_is_current(attribute, since) {
            return false;
        }
        let setting = entries.setting_mut(attribute);
        setting.value = Some(value);
        setting.status = SyncStatus::Synced;
        true
    }

    /// Marks a failed read; the last value is kept
    pub(crate) fn apply_read_failure(&self, attribute: AttributeId, reason: String, since: u64) -> bool {
        let mut entries = self.entries.lock();
        if !entries.read_is_current(attribute, since) {
            return false;
        }
        entries.setting_mut(attribute).status = SyncStatus::Failed(reason);
        true
    }

    /// Success commits the value; failure leaves the value alone
    pub(crate) fn apply_write_result(
        &self,
        attribute: AttributeId,
        value: SettingValue,
        result: Result<(), String>,
    ) {
        let mut entries = self.entries.lock();
        entries.bump(attribute);
        let setting = entries.setting_mut(attribute);
        match result {
            Ok(()) => {
                setting.value = Some(value);
                setting.status = SyncStatus::Synced;
            }
            Err(reason) => setting.status = SyncStatus::Failed(reason),
        }
    }

    /// Optimistically shows the proposed value as `Pending`
    ///
    /// Returns the baseline value for rollback.
    pub(crate) fn begin_write(
        &self,
        attribute: AttributeId,
        proposed: SettingValue,
    ) -> Option<SettingValue> {
        let mut entries = self.entries.lock();
        entries.bump(attribute);
        let setting = entries.setting_mut(attribute);
        let baseline = setting.value;
        setting.value = Some(proposed);
        setting.status = SyncStatus::Pending;
        baseline
    }

    /// Restores the pre-attempt value
    pub(crate) fn rollback(&self, attribute: AttributeId, baseline: Option<SettingValue>) {
        if let Some(setting) = self.entries.lock().settings.get_mut(&attribute) {
            setting.value = baseline;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CurvePoint;

    #[test]
    fn test_unread_attribute_is_unsynced() {
        let store = SettingStore::new();
        let setting = store.get(AttributeId::ChargeLimit);
        assert_eq!(setting.value, None);
        assert_eq!(setting.status, SyncStatus::Unsynced);
    }

    #[test]
    fn test_read_failure_keeps_value() {
        let store = SettingStore::new();
        assert!(store.apply_read(AttributeId::GpuBoost, SettingValue::GpuBoost(2), 0));
        assert!(store.apply_read_failure(AttributeId::GpuBoost, "timeout".into(), 0));

        let setting = store.get(AttributeId::GpuBoost);
        assert_eq!(setting.value, Some(SettingValue::GpuBoost(2)));
        assert_eq!(setting.status, SyncStatus::Failed("timeout".into()));
    }

    #[test]
    fn test_write_cycle() {
        let store = SettingStore::new();
        store.apply_read(AttributeId::ChargeLimit, SettingValue::ChargeLimit(80), 0);

        let baseline = store.begin_write(AttributeId::ChargeLimit, SettingValue::ChargeLimit(70));
        assert_eq!(baseline, Some(SettingValue::ChargeLimit(80)));
        assert_eq!(store.get(AttributeId::ChargeLimit).status, SyncStatus::Pending);
        assert_eq!(store.value(AttributeId::ChargeLimit), Some(SettingValue::ChargeLimit(70)));

        store.rollback(AttributeId::ChargeLimit, baseline);
        store.apply_write_result(
            AttributeId::ChargeLimit,
            SettingValue::ChargeLimit(70),
            Err("EIO".into()),
        );
        let setting = store.get(AttributeId::ChargeLimit);
        assert_eq!(setting.value, Some(SettingValue::ChargeLimit(80)));
        assert!(setting.status.is_failed());

        store.apply_write_result(AttributeId::ChargeLimit, SettingValue::ChargeLimit(75), Ok(()));
        let setting = store.get(AttributeId::ChargeLimit);
        assert_eq!(setting.value, Some(SettingValue::ChargeLimit(75)));
        assert_eq!(setting.status, SyncStatus::Synced);
    }

    #[test]
    fn test_reads_older_than_a_write_are_discarded() {
        let store = SettingStore::new();
        let attribute = AttributeId::GpuBoost;
        let before_write = store.write_generation(attribute);
        assert!(store.apply_read(attribute, SettingValue::GpuBoost(0), before_write));

        store.begin_write(attribute, SettingValue::GpuBoost(3));
        // Nothing read while the write is pending may land
        let during_write = store.write_generation(attribute);
        assert!(!store.apply_read(attribute, SettingValue::GpuBoost(0), during_write));
        assert_eq!(store.get(attribute).status, SyncStatus::Pending);

        store.apply_write_result(attribute, SettingValue::GpuBoost(3), Ok(()));
        assert!(!store.apply_read(attribute, SettingValue::GpuBoost(0), before_write));
        assert!(!store.apply_read_failure(attribute, "EIO".into(), during_write));

        let setting = store.get(attribute);
        assert_eq!(setting.value, Some(SettingValue::GpuBoost(3)));
        assert_eq!(setting.status, SyncStatus::Synced);

        let after_write = store.write_generation(attribute);
        assert!(store.apply_read(attribute, SettingValue::GpuBoost(3), after_write));
    }

    #[test]
    fn test_snapshot_and_curve_assembly() {
        let store = SettingStore::new();
        store.apply_read(
            AttributeId::FanCurvePoint(3),
            SettingValue::CurvePoint(CurvePoint::new(55, 140)),
            0,
        );
        store.apply_read(AttributeId::FanMode, SettingValue::FanMode(FanMode::Custom), 0);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), AttributeId::catalog().len());
        assert_eq!(snapshot[0].status, SyncStatus::Synced);

        let fan_curve = store.fan_curve();
        assert_eq!(fan_curve.get(3), Some(CurvePoint::new(55, 140)));
        assert_eq!(fan_curve.get(2), None);
        assert_eq!(store.fan_mode(), Some(FanMode::Custom));
        assert_eq!(store.charge_mode(), None);
    }
}
