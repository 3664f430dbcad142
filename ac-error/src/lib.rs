//! Unified error handling for aorus-control
//!
//! This crate provides the error types shared by the core library, the CLI
//! and the privileged helper. Validation and driver failures have their own
//! types so callers can match on them; everything converts into
//! [`AorusError`].

use std::io;
use std::path::PathBuf;

/// Result type alias using AorusError
pub type Result<T> = std::result::Result<T, AorusError>;

/// A value was rejected before any hardware access took place
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{attribute} value {value} is out of range ({min}-{max})")]
    OutOfRange {
        attribute: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{attribute} value {value} is not a multiple of {step}")]
    StepMismatch {
        attribute: String,
        value: i64,
        step: i64,
    },

    #[error("fan curve index {index} is out of bounds (0-{max})")]
    IndexOutOfBounds { index: usize, max: usize },

    #[error("{attribute} cannot be applied: {reason}")]
    ModeNotApplicable { attribute: String, reason: String },

    #[error("{0} is read-only")]
    ReadOnly(String),

    #[error("{attribute} does not accept a {found} value")]
    TypeMismatch { attribute: String, found: String },
}

/// A read or write through the driver failed
///
/// The reason is opaque: the core never interprets it beyond recording it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{attribute}: {reason}")]
pub struct DriverError {
    pub attribute: String,
    pub reason: String,
}

impl DriverError {
    pub fn new(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }
}

/// Unified error type for all aorus-control operations
#[derive(thiserror::Error, Debug)]
pub enum AorusError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead { path: PathBuf, source: io::Error },

    #[error("Failed to write file {path}: {source}")]
    FileWrite { path: PathBuf, source: io::Error },

    #[error("File too large: {path} ({size} bytes, max {max_size} bytes)")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    // ============================================================================
    // Attribute Errors
    // ============================================================================
    #[error("Attribute '{0}' not allowed")]
    AttributeNotAllowed(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Failed to parse {attribute} value '{raw}': {reason}")]
    Parse {
        attribute: String,
        raw: String,
        reason: String,
    },

    // ============================================================================
    // Hardware Access Errors
    // ============================================================================
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Hardware controls unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to execute privileged helper: {0}")]
    Helper(String),

    // ============================================================================
    // Validation Errors
    // ============================================================================
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl AorusError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a parse error for a raw attribute value
    pub fn parse(
        attribute: impl Into<String>,
        raw: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::Parse {
            attribute: attribute.into(),
            raw: raw.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a helper execution error
    pub fn helper(msg: impl Into<String>) -> Self {
        Self::Helper(msg.into())
    }

    /// Whether this error was raised before any hardware access
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<String> for AorusError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

impl From<&str> for AorusError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}
