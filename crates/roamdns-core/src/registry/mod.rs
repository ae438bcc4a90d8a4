//! Registries
//!
//! - [`AddressRegistry`]: name → last observed address, the change gate in
//!   front of reconciliation
//! - [`PluginRegistry`]: type name → provider/sink factory, used at startup

pub mod address;
pub mod plugin;

pub use address::{AddressRegistry, host_of};
pub use plugin::PluginRegistry;
