//! Error types re-exported from `ac-error`

pub use ac_error::*;
