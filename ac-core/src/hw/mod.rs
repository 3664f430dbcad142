//! Hardware access modules
//!
//! Contains the driver port and its implementations: direct sysfs access,
//! the privileged helper, and a simulated platform.

mod access;
mod helper;
mod hwmon;
mod memory;
pub mod nodes;
mod port;
mod sysfs;

pub use helper::HelperDriver;
pub use hwmon::{read_system_info, HwmonSource};
pub use memory::MemoryDriver;
pub use port::DriverPort;
pub use sysfs::{read_node_file, write_node_file, SysfsDriver};

use std::sync::Arc;

use crate::data::{ControlConfig, DriverKind};

/// Build the driver selected by the configuration
pub fn driver_from_config(config: &ControlConfig) -> Arc<dyn DriverPort> {
    match config.driver {
        DriverKind::Sysfs => Arc::new(SysfsDriver::from_config(config)),
        DriverKind::Helper => Arc::new(HelperDriver::from_config(config)),
        DriverKind::Simulated => Arc::new(MemoryDriver::simulated()),
    }
}
