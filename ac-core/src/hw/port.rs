//! Driver access port
//!
//! The only seam through which the core touches hardware. Implementations must
//! accept concurrent calls for different attributes.

use async_trait::async_trait;

use crate::data::{AttributeId, SettingValue};
use crate::error::DriverError;

/// Typed get/set access to the catalog attributes
#[async_trait]
pub trait DriverPort: Send + Sync {
    /// Read the current hardware value of an attribute
    async fn read(&self, attribute: AttributeId) -> Result<SettingValue, DriverError>;

    /// Write a value that already passed validation
    async fn write(&self, attribute: AttributeId, value: SettingValue) -> Result<(), DriverError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
