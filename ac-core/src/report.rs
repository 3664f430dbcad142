//! User-facing notifications
//!
//! The core never decides how a message is shown. It hands it to an injected
//! [`Reporter`], at most once per meaningful transition.

use std::fmt;

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Error => "error",
        })
    }
}

/// Receives notifications from the synchronizer, poller and probe
#[cfg_attr(test, mockall::automock)]
pub trait Reporter: Send + Sync {
    fn report(&self, message: &str, severity: Severity);
}

/// Reporter that forwards every notification to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => tracing::info!(target: "aorus::report", "{}", message),
            Severity::Success => tracing::info!(target: "aorus::report", success = true, "{}", message),
            Severity::Error => tracing::error!(target: "aorus::report", "{}", message),
        }
    }
}

/// Reporter that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _message: &str, _severity: Severity) {}
}
