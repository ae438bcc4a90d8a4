//! In-memory map of client name to last observed address
//!
//! The registry is the gate in front of reconciliation: only a report whose
//! host differs from the stored one is worth a round trip to the DNS
//! provider. It holds no history and is dropped at shutdown; the durable
//! record of where a client lives is the DNS record itself and the sink.
//!
//! All access goes through one `std::sync::Mutex`. Guards are never held
//! across an `.await`, so no I/O can run under the lock.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

/// Concurrency-safe name → address map with change detection
#[derive(Debug, Default)]
pub struct AddressRegistry {
    entries: Mutex<HashMap<String, SocketAddr>>,
}

impl AddressRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `address` for `name` and report whether the host changed
    ///
    /// Only the host part is compared; a new source port from the same host
    /// is not a change and leaves the stored entry untouched. Last writer
    /// wins among concurrent reports for the same name.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: name was absent or its host differs; entry replaced
    /// - `Ok(false)`: same host as before; nothing stored
    /// - `Err(Error::InvalidInput)`: `name` is empty
    pub fn observe(&self, name: &str, address: SocketAddr) -> Result<bool> {
        if name.is_empty() {
            return Err(Error::invalid_input("client name cannot be empty"));
        }

        let mut entries = self.lock();
        let changed = match entries.get(name) {
            Some(previous) => host_of(previous) != host_of(&address),
            None => true,
        };
        if changed {
            entries.insert(name.to_string(), address);
        }
        Ok(changed)
    }

    /// Last observed address for `name`
    pub fn get(&self, name: &str) -> Option<SocketAddr> {
        self.lock().get(name).copied()
    }

    /// Forget `name`, returning its last address
    pub fn remove(&self, name: &str) -> Option<SocketAddr> {
        self.lock().remove(name)
    }

    /// Forget `name` only if it still maps to exactly `address`
    ///
    /// Used to undo an observation whose reconciliation failed, so the next
    /// report from the same host counts as a change again. A newer report
    /// that already replaced the entry is left alone.
    pub fn invalidate(&self, name: &str, address: SocketAddr) -> bool {
        let mut entries = self.lock();
        if entries.get(name) == Some(&address) {
            entries.remove(name);
            true
        } else {
            false
        }
    }

    /// Number of known clients
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every entry
    pub fn snapshot(&self) -> HashMap<String, SocketAddr> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SocketAddr>> {
        // The map is always consistent between statements, so a panic in
        // another holder leaves nothing half-written.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Host portion of an address, with IPv4-mapped IPv6 folded to IPv4
pub fn host_of(address: &SocketAddr) -> IpAddr {
    address.ip().to_canonical()
}
