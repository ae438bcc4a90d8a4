// # MySQL Sink
//
// Persists observed address changes into a MySQL table:
//
// ```sql
// CREATE TABLE ip (
//     name    VARCHAR(255) NOT NULL,
//     address VARCHAR(64)  NOT NULL
// );
// ```
//
// The pool connects lazily, so a database that is down at startup only
// costs failed inserts, which the server logs and drops. A keep-alive task
// pings the database on a fixed period and stops when the sink is closed.
//
// ## Security Requirements
//
// - Password NEVER appears in logs or `Debug` output

use async_trait::async_trait;
use roamdns_core::config::SinkConfig;
use roamdns_core::traits::{AddressSink, AddressSinkFactory};
use roamdns_core::{Error, PluginRegistry, Result};
use sqlx::Connection;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Table rows are inserted into
pub const IP_TABLE: &str = "ip";

const INSERT_SQL: &str = "INSERT INTO ip (name, address) VALUES (?, ?)";

/// MySQL port used when `address` has none
const DEFAULT_PORT: u16 = 3306;

/// Connection settings for [`MySqlSink`]
#[derive(Clone)]
pub struct MySqlSettings {
    pub user: String,
    /// ⚠️ NEVER log this value
    pub password: String,
    /// `host` or `host:port`
    pub address: String,
    pub database: String,
    /// Period of the keep-alive ping
    pub keepalive: Duration,
}

impl std::fmt::Debug for MySqlSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlSettings")
            .field("user", &self.user)
            .field("password", &"<REDACTED>")
            .field("address", &self.address)
            .field("database", &self.database)
            .field("keepalive", &self.keepalive)
            .finish()
    }
}

impl MySqlSettings {
    /// Extract settings from a `mysql` sink configuration
    pub fn from_config(config: &SinkConfig) -> Result<Self> {
        match config {
            SinkConfig::Mysql {
                user,
                password,
                address,
                database,
                keepalive_secs,
            } => {
                config.validate()?;
                Ok(Self {
                    user: user.clone(),
                    password: password.clone(),
                    address: address.clone(),
                    database: database.clone(),
                    keepalive: Duration::from_secs(*keepalive_secs),
                })
            }
            _ => Err(Error::config("Invalid config for mysql sink")),
        }
    }

    /// Split `address` into host and port
    pub fn host_port(&self) -> Result<(String, u16)> {
        match self.address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| {
                    Error::config(format!("Invalid MySQL port in address: {}", self.address))
                })?;
                Ok((host.to_string(), port))
            }
            None => Ok((self.address.clone(), DEFAULT_PORT)),
        }
    }

    fn connect_options(&self) -> Result<MySqlConnectOptions> {
        let (host, port) = self.host_port()?;
        Ok(MySqlConnectOptions::new()
            .host(&host)
            .port(port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database))
    }
}

/// MySQL-backed address sink
pub struct MySqlSink {
    pool: MySqlPool,
    settings: MySqlSettings,
    keepalive_stop: Mutex<Option<oneshot::Sender<()>>>,
    keepalive_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for MySqlSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlSink")
            .field("settings", &self.settings)
            .finish()
    }
}

impl MySqlSink {
    /// Build the pool and start the keep-alive task
    ///
    /// Must be called from within a Tokio runtime. No connection is opened
    /// until the first insert or ping.
    pub fn connect(settings: MySqlSettings) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(4)
            .connect_lazy_with(settings.connect_options()?);

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(keepalive(pool.clone(), settings.keepalive, stop_rx));

        tracing::info!(
            "MySQL sink targeting {}/{} as {}",
            settings.address,
            settings.database,
            settings.user
        );

        Ok(Self {
            pool,
            settings,
            keepalive_stop: Mutex::new(Some(stop_tx)),
            keepalive_task: Mutex::new(Some(task)),
        })
    }

    pub fn settings(&self) -> &MySqlSettings {
        &self.settings
    }
}

/// Ping the database every `period` until `stop_rx` fires
async fn keepalive(pool: MySqlPool, period: Duration, mut stop_rx: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = &mut stop_rx => {
                tracing::info!("Stop mysql ping");
                return;
            }

            _ = ticker.tick() => {
                // A slow acquire must not hold up close()
                tokio::select! {
                    biased;

                    _ = &mut stop_rx => {
                        tracing::info!("Stop mysql ping");
                        return;
                    }

                    result = ping(&pool) => {
                        if let Err(e) = result {
                            tracing::error!("MySQL keep-alive ping failed: {}", e);
                        }
                    }
                }
            }
        }
    }
}

async fn ping(pool: &MySqlPool) -> std::result::Result<(), sqlx::Error> {
    let mut conn = pool.acquire().await?;
    conn.ping().await
}

#[async_trait]
impl AddressSink for MySqlSink {
    async fn insert_observed_address(&self, name: &str, address: &str) -> Result<()> {
        sqlx::query(INSERT_SQL)
            .bind(name)
            .bind(address)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::sink(format!("insert into {} failed: {}", IP_TABLE, e)))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let stop = self
            .keepalive_stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = stop {
            let _ = tx.send(());
        }

        let task = self
            .keepalive_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::warn!("MySQL keep-alive task ended abnormally: {}", e);
        }

        self.pool.close().await;
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "mysql"
    }
}

/// Factory for [`MySqlSink`]
pub struct MySqlSinkFactory;

#[async_trait]
impl AddressSinkFactory for MySqlSinkFactory {
    async fn create(&self, config: &SinkConfig) -> Result<Box<dyn AddressSink>> {
        let settings = MySqlSettings::from_config(config)?;
        Ok(Box::new(MySqlSink::connect(settings)?))
    }
}

/// Register the MySQL sink with a registry
pub fn register(registry: &PluginRegistry) {
    registry.register_sink("mysql", Box::new(MySqlSinkFactory));
}
