//! Synchronization engine modules
//!
//! Contains the synchronizer, the telemetry poller, the availability probe and
//! the fan curve model.

mod curve;
mod poller;
mod probe;
mod synchronizer;

pub use curve::{CurveAxis, CurveWarning, FanCurve};
pub use poller::{PollerState, TelemetryPoller};
pub use probe::{remediation, AvailabilityProbe};
pub use synchronizer::{Availability, ReadOutcome, Synchronizer};
