//! Core traits for roamdns
//!
//! This module defines the abstract interfaces for external collaborators.
//!
//! - [`DnsProvider`]: Create/update/delete DNS records via a provider API
//! - [`AddressSink`]: Persist observed address changes

pub mod dns_provider;
pub mod sink;

pub use dns_provider::{DnsProvider, DnsProviderFactory, DnsRecord, RecordType};
pub use sink::{AddressSink, AddressSinkFactory};
