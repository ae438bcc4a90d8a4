//! Plugin-based provider and sink registry
//!
//! The registry allows DNS providers and persistence sinks to be registered
//! by name at startup, so the daemon can build them from configuration
//! without a hard-coded match on every backend.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roamdns_core::PluginRegistry;
//!
//! let registry = PluginRegistry::with_builtin_sinks();
//! roamdns_provider_cloudflare::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! let sink = registry.create_sink(&config.sink).await?;
//! ```

use crate::config::{ProviderConfig, SinkConfig};
use crate::error::{Error, Result};
use crate::sink::{FileSinkFactory, MemorySinkFactory};
use crate::traits::{AddressSink, AddressSinkFactory, DnsProvider, DnsProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry mapping type names to provider and sink factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct PluginRegistry {
    /// Registered DNS provider factories
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,

    /// Registered sink factories
    sinks: RwLock<HashMap<String, Arc<dyn AddressSinkFactory>>>,
}

impl PluginRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `memory` and `file` sinks registered
    pub fn with_builtin_sinks() -> Self {
        let registry = Self::new();
        registry.register_sink("memory", Box::new(MemorySinkFactory));
        registry.register_sink("file", Box::new(FileSinkFactory));
        registry
    }

    /// Register a DNS provider factory under `name` (e.g. "cloudflare")
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.insert(name.into(), factory);
    }

    /// Register a sink factory under `name` (e.g. "mysql")
    pub fn register_sink(&self, name: impl Into<String>, factory: Box<dyn AddressSinkFactory>) {
        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        sinks.insert(name.into(), Arc::from(factory));
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error::Config)`: If the provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create a persistence sink from configuration
    pub async fn create_sink(&self, config: &SinkConfig) -> Result<Box<dyn AddressSink>> {
        let sink_type = config.type_name();

        let factory = {
            let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);
            sinks
                .get(sink_type)
                .ok_or_else(|| Error::config(format!("Unknown sink type: {}", sink_type)))?
                .clone()
        };

        // Lock released before the async create
        factory.create(config).await
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.keys().cloned().collect()
    }

    /// List all registered sink types
    pub fn list_sinks(&self) -> Vec<String> {
        let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);
        sinks.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }

    /// Check if a sink type is registered
    pub fn has_sink(&self, name: &str) -> bool {
        let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);
        sinks.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProviderFactory;

    impl DnsProviderFactory for MockProviderFactory {
        fn create(&self, _config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
            Err(Error::not_found("Mock provider not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = PluginRegistry::new();

        assert!(!registry.has_provider("mock"));
        registry.register_provider("mock", Box::new(MockProviderFactory));

        assert!(registry.has_provider("mock"));
        assert!(registry.list_providers().contains(&"mock".to_string()));
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let registry = PluginRegistry::new();
        let config = ProviderConfig::Custom {
            factory: "route53".to_string(),
            config: serde_json::json!({}),
        };

        let res = registry.create_provider(&config);
        assert!(matches!(res, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn builtin_sinks_are_available() {
        let registry = PluginRegistry::with_builtin_sinks();
        assert!(registry.has_sink("memory"));
        assert!(registry.has_sink("file"));
        assert!(!registry.has_sink("mysql"));

        let sink = registry.create_sink(&SinkConfig::Memory).await.unwrap();
        assert_eq!(sink.sink_name(), "memory");
    }

    #[tokio::test]
    async fn unregistered_sink_is_a_config_error() {
        let registry = PluginRegistry::with_builtin_sinks();
        let config = SinkConfig::Mysql {
            user: "u".to_string(),
            password: "p".to_string(),
            address: "db:3306".to_string(),
            database: "d".to_string(),
            keepalive_secs: 900,
        };
        assert!(matches!(registry.create_sink(&config).await, Err(Error::Config(_))));
    }
}
