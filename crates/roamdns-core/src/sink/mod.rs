// # Sink Implementations
//
// Built-in implementations of the AddressSink trait.

pub mod file;
pub mod memory;

pub use file::{FileSink, FileSinkFactory};
pub use memory::{MemorySink, MemorySinkFactory};

use serde::{Deserialize, Serialize};

/// One observed address change, as stored by the built-in sinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedAddress {
    pub name: String,
    pub address: String,
    pub observed_at: chrono::DateTime<chrono::Utc>,
}

impl ObservedAddress {
    pub(crate) fn now(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
            observed_at: chrono::Utc::now(),
        }
    }
}
