// # roamdnsd - roaming DNS daemon
//
// Thin integration layer over roamdns-core. The daemon is responsible for:
// 1. Reading the JSON configuration file
// 2. Initializing logging and the runtime
// 3. Registering providers and sinks
// 4. Running the report server or the reporting client until a signal
//
// ## Configuration
//
// - `ROAMDNS_CONFIG`: path to the configuration file (default `config.json`)
// - `ROAMDNS_LOG_LEVEL`: overrides `log_level` from the file
//
// ## Example
//
// ```bash
// cat > server.json <<EOF
// {
//   "mode": "server",
//   "server": { "listen_addr": "0.0.0.0:49164", "domain_name": "example.com" },
//   "provider": { "type": "cloudflare", "api_token": "...", "zone_id": "..." },
//   "sink": { "type": "file", "path": "/var/lib/roamdns/history.jsonl" }
// }
// EOF
// ROAMDNS_CONFIG=server.json roamdnsd
// ```

use anyhow::{Context, Result};
use roamdns_core::{
    ClientConfig, Config, Mode, PluginRegistry, Reconciler, Reporter, Server, ServerConfig,
};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Default configuration file path
const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum RoamExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<RoamExitCode> for ExitCode {
    fn from(code: RoamExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Failure raised before the service is up
#[derive(Debug)]
struct StartupError(anyhow::Error);

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl std::error::Error for StartupError {}

fn main() -> ExitCode {
    let config_path = env::var("ROAMDNS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    // Load and validate configuration
    let config = match Config::from_file(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error ({}): {}", config_path, e);
            return RoamExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let level_name = env::var("ROAMDNS_LOG_LEVEL").unwrap_or_else(|_| config.effective_log_level());
    let log_level = match level_name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RoamExitCode::ConfigError.into();
    }

    info!("Starting roamdnsd in {:?} mode", config.mode);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RoamExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => RoamExitCode::CleanShutdown,
            Err(e) if e.is::<StartupError>() => {
                error!("Startup failed: {}", e);
                RoamExitCode::ConfigError
            }
            Err(e) => {
                error!("Daemon error: {:#}", e);
                RoamExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run the configured mode until a shutdown signal arrives
async fn run_daemon(config: Config) -> Result<()> {
    match config.mode {
        Mode::Server => {
            let server = config
                .server
                .as_ref()
                .context("server mode requires a `server` section")
                .map_err(StartupError)?;
            run_server(server, &config).await
        }
        Mode::Client => {
            let client = config
                .client
                .as_ref()
                .context("client mode requires a `client` section")
                .map_err(StartupError)?;
            run_client(client).await
        }
    }
}

/// Create the plugin registry with every compiled-in backend
fn build_registry() -> PluginRegistry {
    let registry = PluginRegistry::with_builtin_sinks();

    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare provider");
        roamdns_provider_cloudflare::register(&registry);
    }

    #[cfg(feature = "mysql")]
    {
        info!("Registering MySQL sink");
        roamdns_sink_mysql::register(&registry);
    }

    registry
}

async fn run_server(server_config: &ServerConfig, config: &Config) -> Result<()> {
    let registry = build_registry();

    let provider_config = config
        .provider
        .as_ref()
        .context("server mode requires a `provider` section")
        .map_err(StartupError)?;
    let provider = registry
        .create_provider(provider_config)
        .map_err(|e| StartupError(e.into()))?;
    let sink = registry
        .create_sink(&config.sink)
        .await
        .map_err(|e| StartupError(e.into()))?;
    let sink: Arc<dyn roamdns_core::AddressSink> = Arc::from(sink);

    info!("Provider: {}", provider.provider_name());
    info!("Sink: {}", sink.sink_name());
    info!("Domain: {}", server_config.domain_name);

    let reconciler = Reconciler::new(Arc::from(provider), server_config.domain_name.clone());
    let handle = Server::new(reconciler, Arc::clone(&sink))
        .with_read_timeout(server_config.read_timeout())
        .bind(server_config.listen_addr())
        .await
        .map_err(|e| StartupError(e.into()))?;

    info!("Serving reports on {}", handle.local_addr());

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);

    // Stop accepting first, then release the sink
    handle.stop().await.context("listener shutdown failed")?;
    if let Err(e) = sink.close().await {
        error!("Failed to close {} sink: {}", sink.sink_name(), e);
    }

    info!("Server stopped");
    Ok(())
}

async fn run_client(client_config: &ClientConfig) -> Result<()> {
    check_host_port(client_config.dial_addr()).map_err(StartupError)?;
    let reporter = Reporter::from_config(client_config).map_err(|e| StartupError(e.into()))?;
    let handle = reporter.start();

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);

    handle.stop().await.context("reporter shutdown failed")?;
    info!("Client stopped");
    Ok(())
}

/// Reject dial addresses that are not `host:port`
fn check_host_port(addr: &str) -> Result<()> {
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("dial address '{}' must be host:port", addr))?;
    if host.is_empty() {
        anyhow::bail!("dial address '{}' has no host", addr);
    }
    port.parse::<u16>()
        .with_context(|| format!("dial address '{}' has an invalid port", addr))?;
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_is_required() {
        assert!(check_host_port("203.0.113.5:49164").is_ok());
        assert!(check_host_port("server.example.com:49164").is_ok());
        assert!(check_host_port("[2001:db8::1]:49164").is_ok());
        assert!(check_host_port("203.0.113.5").is_err());
        assert!(check_host_port(":49164").is_err());
        assert!(check_host_port("203.0.113.5:port").is_err());
    }

    #[test]
    fn startup_errors_are_recognized() {
        let err: anyhow::Error = StartupError(anyhow::anyhow!("bad listen address")).into();
        assert!(err.is::<StartupError>());
        assert_eq!(err.to_string(), "bad listen address");
    }

    #[test]
    fn registry_has_builtin_sinks() {
        let registry = build_registry();
        assert!(registry.has_sink("memory"));
        assert!(registry.has_sink("file"));
    }
}
