// # Address Sink Trait
//
// Defines the fire-and-forget persistence target for observed address
// changes.
//
// ## Purpose
//
// The sink keeps a durable history of where each client has been seen. The
// server calls it once per detected change; failures are logged and dropped,
// never retried, and never block the DNS update.
//
// ## Implementations
//
// - Memory: `MemorySink` (in this crate)
// - File: `FileSink`, JSON lines (in this crate)
// - MySQL: `roamdns-sink-mysql` crate

use async_trait::async_trait;

/// Trait for persistence sink implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait AddressSink: Send + Sync {
    /// Record that `name` was observed at `address`
    async fn insert_observed_address(&self, name: &str, address: &str)
    -> Result<(), crate::Error>;

    /// Release resources and stop any background work owned by the sink
    async fn close(&self) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Sink name for logs
    fn sink_name(&self) -> &'static str;
}

/// Helper trait for constructing sinks from configuration
#[async_trait]
pub trait AddressSinkFactory: Send + Sync {
    /// Create an AddressSink instance from configuration
    async fn create(
        &self,
        config: &crate::config::SinkConfig,
    ) -> Result<Box<dyn AddressSink>, crate::Error>;
}
