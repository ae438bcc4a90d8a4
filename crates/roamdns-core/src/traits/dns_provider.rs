// # DNS Provider Trait
//
// Defines the four record operations the reconciler consumes from an external
// DNS provider.
//
// ## Implementations
//
// - Cloudflare: `roamdns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use roamdns_core::DnsProvider;
// use roamdns_core::traits::RecordType;
//
// async fn point_at(provider: &dyn DnsProvider) -> roamdns_core::Result<()> {
//     match provider.find_record("example.com", "alice").await? {
//         Some(rec) => provider.update_record(&rec.id, "alice", RecordType::A, "203.0.113.7").await,
//         None => provider
//             .create_record("example.com", "alice", RecordType::A, "203.0.113.7")
//             .await
//             .map(|_| ()),
//     }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// DNS record type managed by roamdns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
}

impl RecordType {
    /// Record type for the given address family
    pub fn for_ip(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record as seen by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Provider-specific opaque identifier
    pub id: String,
    /// Record name relative to the domain (e.g. "alice")
    pub name: String,
    /// Record value (the address string)
    pub value: String,
    /// Record type
    pub record_type: RecordType,
}

/// Trait for DNS provider implementations
///
/// Every method is a single round trip to the provider. Implementations must
/// not retry, cache, or spawn tasks: the [`Reconciler`](crate::Reconciler)
/// owns the retry policy (lookups only) and decides which call to make.
///
/// # Thread Safety
///
/// Implementations must be thread-safe: the server invokes the provider from
/// many connection tasks concurrently.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up the record named `record_name` in `domain`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: exact name match found
    /// - `Ok(None)`: no record with that name
    /// - `Err(Error)`: the lookup itself failed
    async fn find_record(
        &self,
        domain: &str,
        record_name: &str,
    ) -> Result<Option<DnsRecord>, crate::Error>;

    /// Create a record and return its identifier
    async fn create_record(
        &self,
        domain: &str,
        record_name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<String, crate::Error>;

    /// Overwrite the record identified by `record_id`
    async fn update_record(
        &self,
        record_id: &str,
        record_name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<(), crate::Error>;

    /// Delete the record identified by `record_id`
    async fn delete_record(&self, record_id: &str) -> Result<(), crate::Error>;

    /// Provider name for logs (e.g. "cloudflare")
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_type_follows_address_family() {
        assert_eq!(RecordType::for_ip(&"203.0.113.7".parse().unwrap()), RecordType::A);
        assert_eq!(RecordType::for_ip(&"2001:db8::1".parse().unwrap()), RecordType::Aaaa);
        assert_eq!(RecordType::Aaaa.to_string(), "AAAA");
    }
}
