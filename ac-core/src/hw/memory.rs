//! Simulated platform
//!
//! An in-memory stand-in for the platform driver, used by `--simulate` and by
//! tests. It counts every access and can inject failures, latency, and the
//! firmware quirk where a write takes effect but still reports an error.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use crate::constants::curve;
use crate::data::{AttributeId, ChargeMode, CurvePoint, FanMode, SettingValue, SystemInfo};
use crate::error::DriverError;
use crate::hw::port::DriverPort;

#[derive(Debug, Clone)]
struct Fault {
    remaining: usize,
    reason: String,
    /// Apply the write before failing
    commit: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    values: HashMap<AttributeId, SettingValue>,
    reads: HashMap<AttributeId, usize>,
    writes: HashMap<AttributeId, usize>,
    read_faults: HashMap<AttributeId, Fault>,
    write_faults: HashMap<AttributeId, Fault>,
    unavailable: Option<String>,
}

impl MemoryState {
    fn take_fault(faults: &mut HashMap<AttributeId, Fault>, attribute: AttributeId) -> Option<Fault> {
        let fault = faults.get_mut(&attribute)?;
        if fault.remaining == 0 {
            return None;
        }
        fault.remaining = fault.remaining.saturating_sub(1);
        Some(fault.clone())
    }
}

/// In-memory driver with fault injection
#[derive(Debug, Default)]
pub struct MemoryDriver {
    state: Mutex<MemoryState>,
    read_latency: Mutex<Duration>,
    write_latency: Mutex<Duration>,
}

impl MemoryDriver {
    /// Empty platform: every read fails until values are set
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform populated with plausible values for every attribute
    pub fn simulated() -> Self {
        let driver = Self::new();
        {
            let mut state = driver.state.lock();
            let values = &mut state.values;
            values.insert(AttributeId::FanMode, SettingValue::FanMode(FanMode::Normal));
            values.insert(AttributeId::FanCustomSpeed, SettingValue::FanCustomSpeed(50));
            values.insert(AttributeId::ChargeMode, SettingValue::ChargeMode(ChargeMode::Normal));
            values.insert(AttributeId::ChargeLimit, SettingValue::ChargeLimit(80));
            values.insert(AttributeId::BatteryCycle, SettingValue::BatteryCycle(127));
            values.insert(AttributeId::GpuBoost, SettingValue::GpuBoost(0));
            values.insert(AttributeId::UsbChargeS3, SettingValue::UsbCharge(true));
            values.insert(AttributeId::UsbChargeS4, SettingValue::UsbCharge(false));
            for index in 0..curve::POINT_COUNT as u8 {
                let point = CurvePoint::new(30 + index * 5, 60 + index * 13);
                values.insert(AttributeId::FanCurvePoint(index), SettingValue::CurvePoint(point));
            }
            values.insert(
                AttributeId::SystemInfo,
                SettingValue::SystemInfo(SystemInfo {
                    cpu_temp: 52,
                    gpu_temp: 47,
                    mb_temp: 38,
                    cpu_fan_rpm: 2400,
                    gpu_fan_rpm: 2100,
                }),
            );
        }
        driver
    }

    /// Set the hardware value directly, bypassing the counters
    pub fn set_value(&self, attribute: AttributeId, value: SettingValue) {
        self.state.lock().values.insert(attribute, value);
    }

    pub fn value(&self, attribute: AttributeId) -> Option<SettingValue> {
        self.state.lock().values.get(&attribute).copied()
    }

    pub fn read_count(&self, attribute: AttributeId) -> usize {
        self.state.lock().reads.get(&attribute).copied().unwrap_or(0)
    }

    pub fn write_count(&self, attribute: AttributeId) -> usize {
        self.state.lock().writes.get(&attribute).copied().unwrap_or(0)
    }

    pub fn total_writes(&self) -> usize {
        self.state.lock().writes.values().sum()
    }

    /// Fail the next `count` reads of an attribute
    pub fn fail_reads(&self, attribute: AttributeId, count: usize, reason: impl Into<String>) {
        self.state.lock().read_faults.insert(
            attribute,
            Fault {
                remaining: count,
                reason: reason.into(),
                commit: false,
            },
        );
    }

    /// Fail the next `count` writes of an attribute without applying them
    pub fn fail_writes(&self, attribute: AttributeId, count: usize, reason: impl Into<String>) {
        self.state.lock().write_faults.insert(
            attribute,
            Fault {
                remaining: count,
                reason: reason.into(),
                commit: false,
            },
        );
    }

    /// Apply the next `count` writes but report them as failed
    pub fn commit_then_fail_writes(
        &self,
        attribute: AttributeId,
        count: usize,
        reason: impl Into<String>,
    ) {
        self.state.lock().write_faults.insert(
            attribute,
            Fault {
                remaining: count,
                reason: reason.into(),
                commit: true,
            },
        );
    }

    /// Fail every access, as if the platform were unreachable
    pub fn set_unavailable(&self, reason: Option<String>) {
        self.state.lock().unavailable = reason;
    }

    /// Delay applied to every access
    pub fn set_latency(&self, latency: Duration) {
        *self.read_latency.lock() = latency;
        *self.write_latency.lock() = latency;
    }

    /// Delay between sampling a value and returning it
    pub fn set_read_latency(&self, latency: Duration) {
        *self.read_latency.lock() = latency;
    }

    async fn delay(latency: &Mutex<Duration>) {
        let latency = *latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DriverPort for MemoryDriver {
    async fn read(&self, attribute: AttributeId) -> Result<SettingValue, DriverError> {
        // Sampled up front, like a sysfs read that completes late
        let outcome = {
            let mut state = self.state.lock();
            *state.reads.entry(attribute).or_default() += 1;
            trace!(attribute = %attribute, "Simulated read");

            if let Some(reason) = &state.unavailable {
                Err(DriverError::new(attribute.to_string(), reason.clone()))
            } else if let Some(fault) = MemoryState::take_fault(&mut state.read_faults, attribute) {
                Err(DriverError::new(attribute.to_string(), fault.reason))
            } else {
                state.values.get(&attribute).copied().ok_or_else(|| {
                    DriverError::new(attribute.to_string(), "No such file or directory")
                })
            }
        };

        Self::delay(&self.read_latency).await;
        outcome
    }

    async fn write(&self, attribute: AttributeId, value: SettingValue) -> Result<(), DriverError> {
        Self::delay(&self.write_latency).await;

        let mut state = self.state.lock();
        *state.writes.entry(attribute).or_default() += 1;
        trace!(attribute = %attribute, %value, "Simulated write");

        if let Some(reason) = &state.unavailable {
            return Err(DriverError::new(attribute.to_string(), reason.clone()));
        }
        if let Some(fault) = MemoryState::take_fault(&mut state.write_faults, attribute) {
            if fault.commit {
                state.values.insert(attribute, value);
            }
            return Err(DriverError::new(attribute.to_string(), fault.reason));
        }
        state.values.insert(attribute, value);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_platform_is_complete() {
        let driver = MemoryDriver::simulated();
        for attribute in AttributeId::catalog() {
            assert!(driver.read(attribute).await.is_ok(), "{} unreadable", attribute);
        }
        assert_eq!(driver.total_writes(), 0);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let driver = MemoryDriver::simulated();
        driver.fail_reads(AttributeId::GpuBoost, 2, "EIO");
        assert!(driver.read(AttributeId::GpuBoost).await.is_err());
        assert!(driver.read(AttributeId::GpuBoost).await.is_err());
        assert!(driver.read(AttributeId::GpuBoost).await.is_ok());
        assert_eq!(driver.read_count(AttributeId::GpuBoost), 3);

        driver.commit_then_fail_writes(AttributeId::ChargeLimit, 1, "EBUSY");
        let err = driver
            .write(AttributeId::ChargeLimit, SettingValue::ChargeLimit(70))
            .await
            .unwrap_err();
        assert_eq!(err.reason, "EBUSY");
        assert_eq!(driver.value(AttributeId::ChargeLimit), Some(SettingValue::ChargeLimit(70)));

        driver.fail_writes(AttributeId::ChargeLimit, 1, "EIO");
        assert!(driver
            .write(AttributeId::ChargeLimit, SettingValue::ChargeLimit(90))
            .await
            .is_err());
        assert_eq!(driver.value(AttributeId::ChargeLimit), Some(SettingValue::ChargeLimit(70)));
    }

    #[tokio::test]
    async fn test_unavailable_platform() {
        let driver = MemoryDriver::simulated();
        driver.set_unavailable(Some("Permission denied".into()));
        let err = driver.read(AttributeId::FanMode).await.unwrap_err();
        assert_eq!(err.reason, "Permission denied");
        driver.set_unavailable(None);
        assert!(driver.read(AttributeId::FanMode).await.is_ok());
    }
}
