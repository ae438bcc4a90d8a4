//! Configuration types for roamdns
//!
//! The daemon reads one JSON document; this module defines its shape,
//! defaults and validation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{error, warn};

/// Listen address used when `server.listen_addr` is omitted
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:49164";

/// Dial address used when `client.dial_addr` is omitted
pub const DEFAULT_DIAL_ADDR: &str = "127.0.0.1:49164";

/// Reporting interval used when `client.interval` is missing or unparsable
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Which side of the protocol this process runs
    pub mode: Mode,

    /// Verbose logging to the console
    #[serde(default)]
    pub debug: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub log_level: Option<String>,

    /// Server settings (required in server mode)
    #[serde(default)]
    pub server: Option<ServerConfig>,

    /// Client settings (required in client mode)
    #[serde(default)]
    pub client: Option<ClientConfig>,

    /// DNS provider (required in server mode)
    #[serde(default)]
    pub provider: Option<ProviderConfig>,

    /// Persistence sink for observed addresses
    #[serde(default)]
    pub sink: SinkConfig,
}

impl Config {
    /// Load and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a configuration document
    pub fn from_json_str(text: &str) -> Result<Self, crate::Error> {
        let config: Config = serde_json::from_str(text)
            .map_err(|e| crate::Error::config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self.mode {
            Mode::Server => {
                let server = self
                    .server
                    .as_ref()
                    .ok_or_else(|| crate::Error::config("server mode requires a `server` section"))?;
                server.validate()?;

                let provider = self.provider.as_ref().ok_or_else(|| {
                    crate::Error::config("server mode requires a `provider` section")
                })?;
                provider.validate()?;
                self.sink.validate()?;
            }
            Mode::Client => {
                let client = self
                    .client
                    .as_ref()
                    .ok_or_else(|| crate::Error::config("client mode requires a `client` section"))?;
                client.validate()?;
            }
        }

        if let Some(level) = &self.log_level {
            match level.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => {}
                _ => {
                    return Err(crate::Error::config(format!(
                        "log_level '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                        level
                    )));
                }
            }
        }

        Ok(())
    }

    /// Effective log level: explicit setting, else `debug` when debug is on
    pub fn effective_log_level(&self) -> String {
        match &self.log_level {
            Some(level) => level.to_lowercase(),
            None if self.debug => "debug".to_string(),
            None => "info".to_string(),
        }
    }
}

/// Process mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Server,
    Client,
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// host:port to listen on
    #[serde(default)]
    pub listen_addr: Option<String>,

    /// Domain whose records are reconciled (e.g. "example.com")
    pub domain_name: String,

    /// How long a connection may take to deliver its request
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl ServerConfig {
    pub fn new(domain_name: impl Into<String>) -> Self {
        Self {
            listen_addr: None,
            domain_name: domain_name.into(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }

    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domain_name.trim().is_empty() {
            return Err(crate::Error::config("server.domain_name cannot be empty"));
        }
        if self.read_timeout_secs == 0 {
            return Err(crate::Error::config("server.read_timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Configured listen address, or [`DEFAULT_LISTEN_ADDR`]
    pub fn listen_addr(&self) -> &str {
        match self.listen_addr.as_deref() {
            Some(addr) if !addr.is_empty() => addr,
            _ => {
                warn!("Using default listen address: {}", DEFAULT_LISTEN_ADDR);
                DEFAULT_LISTEN_ADDR
            }
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Client (reporter) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Stable client identity; becomes the DNS record name
    pub name: String,

    /// Server host:port
    #[serde(default)]
    pub dial_addr: Option<String>,

    /// Reporting interval, e.g. "30s", "1m", "2h"
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Upper bound on one dial + request + response exchange
    #[serde(default = "default_client_timeout_secs")]
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dial_addr: None,
            interval: default_interval(),
            timeout_secs: default_client_timeout_secs(),
        }
    }

    pub fn with_dial_addr(mut self, addr: impl Into<String>) -> Self {
        self.dial_addr = Some(addr.into());
        self
    }

    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::config("client.name cannot be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("client.timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Configured dial address, or [`DEFAULT_DIAL_ADDR`]
    pub fn dial_addr(&self) -> &str {
        match self.dial_addr.as_deref() {
            Some(addr) if !addr.is_empty() => addr,
            _ => {
                warn!("Using default dial address: {}", DEFAULT_DIAL_ADDR);
                DEFAULT_DIAL_ADDR
            }
        }
    }

    /// Parsed reporting interval, falling back to [`DEFAULT_REPORT_INTERVAL`]
    pub fn interval(&self) -> Duration {
        parse_interval(&self.interval)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Parse a human-readable interval; unparsable or zero values fall back to
/// [`DEFAULT_REPORT_INTERVAL`]
pub fn parse_interval(text: &str) -> Duration {
    match humantime::parse_duration(text.trim()) {
        Ok(d) if !d.is_zero() => d,
        Ok(_) => {
            error!(
                "Reporting interval must be > 0, using default {:?}",
                DEFAULT_REPORT_INTERVAL
            );
            DEFAULT_REPORT_INTERVAL
        }
        Err(e) => {
            error!(
                "Cannot parse reporting interval '{}': {}, using default {:?}",
                text, e, DEFAULT_REPORT_INTERVAL
            );
            DEFAULT_REPORT_INTERVAL
        }
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Zone ID of `server.domain_name`
        zone_id: String,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

// Credentials and opaque custom blocks stay out of `{:?}`
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Cloudflare { zone_id, .. } => f
                .debug_struct("Cloudflare")
                .field("api_token", &"<REDACTED>")
                .field("zone_id", zone_id)
                .finish(),
            ProviderConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, zone_id } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                if zone_id.is_empty() {
                    return Err(crate::Error::config("Cloudflare zone_id cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Persistence sink configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// In-memory sink (not persistent)
    #[default]
    Memory,

    /// Append-only JSON lines file
    File {
        /// Path to the history file
        path: String,
    },

    /// MySQL table `ip (name, address)`
    Mysql {
        user: String,
        password: String,
        /// host:port
        address: String,
        database: String,
        /// Interval between keep-alive probes
        #[serde(default = "default_keepalive_secs")]
        keepalive_secs: u64,
    },

    /// Custom sink
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl std::fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkConfig::Memory => f.write_str("Memory"),
            SinkConfig::File { path } => f.debug_struct("File").field("path", path).finish(),
            SinkConfig::Mysql {
                user,
                address,
                database,
                keepalive_secs,
                ..
            } => f
                .debug_struct("Mysql")
                .field("user", user)
                .field("password", &"<REDACTED>")
                .field("address", address)
                .field("database", database)
                .field("keepalive_secs", keepalive_secs)
                .finish(),
            SinkConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

impl SinkConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SinkConfig::Memory => Ok(()),
            SinkConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("sink.path cannot be empty"));
                }
                Ok(())
            }
            SinkConfig::Mysql {
                user,
                address,
                database,
                keepalive_secs,
                ..
            } => {
                if user.is_empty() || address.is_empty() || database.is_empty() {
                    return Err(crate::Error::config(
                        "MySQL sink requires user, address and database",
                    ));
                }
                if *keepalive_secs == 0 {
                    return Err(crate::Error::config("sink.keepalive_secs must be > 0"));
                }
                Ok(())
            }
            SinkConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom sink factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the sink type name
    pub fn type_name(&self) -> &str {
        match self {
            SinkConfig::Memory => "memory",
            SinkConfig::File { .. } => "file",
            SinkConfig::Mysql { .. } => "mysql",
            SinkConfig::Custom { factory, .. } => factory,
        }
    }
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_client_timeout_secs() -> u64 {
    10
}

fn default_interval() -> String {
    "1m".to_string()
}

fn default_keepalive_secs() -> u64 {
    15 * 60
}
