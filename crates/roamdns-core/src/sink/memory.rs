// # Memory Sink
//
// In-memory implementation of AddressSink.
//
// Keeps every observed change in a Vec. Nothing survives a restart, which is
// fine for tests and for deployments where the DNS record is the only state
// that matters.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::ObservedAddress;
use crate::Error;
use crate::config::SinkConfig;
use crate::traits::{AddressSink, AddressSinkFactory};

/// In-memory sink
///
/// Clones share the same rows, so a test can keep one handle and give the
/// other to the server.
///
/// # Example
///
/// ```rust,no_run
/// use roamdns_core::sink::MemorySink;
/// use roamdns_core::traits::AddressSink;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let sink = MemorySink::new();
///     sink.insert_observed_address("alice", "203.0.113.7").await?;
///     assert_eq!(sink.len().await, 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    rows: Arc<RwLock<Vec<ObservedAddress>>>,
}

impl MemorySink {
    /// Create a new empty memory sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Copy of all stored rows, oldest first
    pub async fn rows(&self) -> Vec<ObservedAddress> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl AddressSink for MemorySink {
    async fn insert_observed_address(&self, name: &str, address: &str) -> Result<(), Error> {
        self.rows
            .write()
            .await
            .push(ObservedAddress::now(name, address));
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for [`MemorySink`]
pub struct MemorySinkFactory;

#[async_trait]
impl AddressSinkFactory for MemorySinkFactory {
    async fn create(&self, config: &SinkConfig) -> Result<Box<dyn AddressSink>, Error> {
        match config {
            SinkConfig::Memory => Ok(Box::new(MemorySink::new())),
            _ => Err(Error::config("Invalid config for memory sink")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rows_are_kept_in_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty().await);

        sink.insert_observed_address("alice", "203.0.113.7").await.unwrap();
        sink.insert_observed_address("alice", "198.51.100.9").await.unwrap();

        let rows = sink.rows().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].address, "203.0.113.7");
        assert_eq!(rows[1].address, "198.51.100.9");
        assert!(rows[0].observed_at <= rows[1].observed_at);
    }

    #[tokio::test]
    async fn clones_share_rows() {
        let sink = MemorySink::new();
        let handle = sink.clone();
        sink.insert_observed_address("bob", "10.0.0.2").await.unwrap();
        assert_eq!(handle.len().await, 1);
    }
}
