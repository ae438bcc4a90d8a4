// # roamdns-core
//
// Core library for roaming-client dynamic DNS.
//
// ## Architecture Overview
//
// A roaming client cannot see its own public address, so it periodically
// connects to a server and announces a stable name. The server reads the
// address off the connection and keeps DNS in step:
//
// - **protocol**: newline-terminated JSON request/response envelope
// - **AddressRegistry**: name → last observed address, with change detection
// - **Reconciler**: idempotent upsert/delete against a `DnsProvider`
// - **Server**: accept loop, one request and one response per connection
// - **Reporter**: client-side periodic report loop
// - **AddressSink**: best-effort history of observed changes
// - **PluginRegistry**: factories for providers and sinks, keyed by type name
//
// ## Design Principles
//
// 1. **Change-gated**: only a new host triggers a provider round trip
// 2. **Stateless reconciliation**: every call is lookup-then-act
// 3. **Isolated failures**: one connection, one tick, one reconciliation
// 4. **Plugin-Based**: providers and sinks are registered by name

pub mod config;
pub mod error;
pub mod protocol;
pub mod reconcile;
pub mod registry;
pub mod reporter;
pub mod server;
pub mod sink;
pub mod traits;

// Re-export core types for convenience
pub use config::{ClientConfig, Config, Mode, ProviderConfig, ServerConfig, SinkConfig};
pub use error::{Error, Result};
pub use reconcile::{DeleteOutcome, Reconciler, UpsertOutcome};
pub use registry::{AddressRegistry, PluginRegistry};
pub use reporter::{Reporter, ReporterHandle};
pub use server::{Server, ServerHandle};
pub use sink::{FileSink, MemorySink};
pub use traits::{AddressSink, DnsProvider, DnsRecord, RecordType};
