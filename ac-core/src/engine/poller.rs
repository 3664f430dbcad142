//! Periodic telemetry refresh
//!
//! While polling, the telemetry entry is refreshed immediately and then on a
//! fixed period through the synchronizer; a slow read does not shift later
//! ticks. The first failure of a streak is
//! reported; further consecutive failures are only logged until a read
//! succeeds again.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::constants::timing;
use crate::data::AttributeId;
use crate::engine::synchronizer::Synchronizer;
use crate::report::Severity;

/// Consecutive failures between repeated log lines
const LOG_EVERY_FAILURES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
}

struct PollerShared {
    sync: Synchronizer,
    interval: Duration,
    /// Current streak has already been reported
    error_surfaced: AtomicBool,
    failures: AtomicU32,
    ticks: watch::Sender<u64>,
}

impl PollerShared {
    async fn poll_once(&self) -> bool {
        let ok = match self.sync.refresh_attribute(AttributeId::SystemInfo).await {
            Ok(_) => {
                let failures = self.failures.swap(0, Ordering::SeqCst);
                if self.error_surfaced.swap(false, Ordering::SeqCst) {
                    info!(failures, "Telemetry recovered");
                }
                true
            }
            Err(e) => {
                let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                if !self.error_surfaced.swap(true, Ordering::SeqCst) {
                    error!(error = %e, "Telemetry read failed");
                    self.sync.reporter().report(
                        &format!("Failed to read system information: {}", e.reason),
                        Severity::Error,
                    );
                } else if failures % LOG_EVERY_FAILURES == 0 {
                    warn!(failures, error = %e, "Telemetry still failing");
                }
                false
            }
        };
        self.ticks.send_modify(|tick| *tick += 1);
        ok
    }
}

struct Activation {
    handle: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

/// Fixed-interval telemetry refresher
pub struct TelemetryPoller {
    shared: Arc<PollerShared>,
    activation: Mutex<Option<Activation>>,
}

impl TelemetryPoller {
    /// Intervals below the configured minimum are raised to it
    pub fn new(sync: Synchronizer, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(timing::MIN_TELEMETRY_INTERVAL_MS));
        let (ticks, _) = watch::channel(0);
        Self {
            shared: Arc::new(PollerShared {
                sync,
                interval,
                error_surfaced: AtomicBool::new(false),
                failures: AtomicU32::new(0),
                ticks,
            }),
            activation: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    pub fn state(&self) -> PollerState {
        match &*self.activation.lock() {
            Some(activation) if !activation.handle.is_finished() => PollerState::Polling,
            _ => PollerState::Idle,
        }
    }

    /// Completed poll count, updated after every refresh
    pub fn ticks(&self) -> watch::Receiver<u64> {
        self.shared.ticks.subscribe()
    }

    /// Start polling; a no-op while already polling
    ///
    /// Each activation starts with a clean failure streak.
    pub fn start(&self) {
        let mut activation = self.activation.lock();
        if matches!(&*activation, Some(a) if !a.handle.is_finished()) {
            debug!("Poller already running");
            return;
        }

        self.shared.error_surfaced.store(false, Ordering::SeqCst);
        self.shared.failures.store(0, Ordering::SeqCst);

        let cancelled = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(Notify::new());
        let shared = Arc::clone(&self.shared);
        let task_cancelled = Arc::clone(&cancelled);
        let task_stop = Arc::clone(&stop);

        let handle = tokio::spawn(async move {
            info!(interval_ms = shared.interval.as_millis() as u64, "Telemetry polling started");
            // The first tick completes immediately
            let mut ticker = tokio::time::interval(shared.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = task_stop.notified() => break,
                }
                if task_cancelled.load(Ordering::SeqCst) {
                    break;
                }
                shared.poll_once().await;
            }
            debug!("Telemetry polling loop exited");
        });

        *activation = Some(Activation {
            handle,
            cancelled,
            stop,
        });
    }

    /// Stop polling; no refresh is issued after this returns
    pub fn stop(&self) {
        if let Some(activation) = self.activation.lock().take() {
            activation.cancelled.store(true, Ordering::SeqCst);
            activation.stop.notify_one();
            activation.handle.abort();
            info!("Telemetry polling stopped");
        }
    }

    /// One refresh outside the loop, with the same streak handling
    ///
    /// Returns whether the read succeeded.
    pub async fn poll_once(&self) -> bool {
        self.shared.poll_once().await
    }
}

impl Drop for TelemetryPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
