//! Client-side periodic reporter
//!
//! The reporter announces a stable identity to the server on a fixed
//! interval. The server learns the client's address from the connection
//! itself, so the only payload is the name.
//!
//! ## Loop
//!
//! ```text
//!  ┌──────── interval tick ────────┐
//!  │                               ▼
//!  │     dial ─▶ Request ─▶ Response   (one attempt, bounded by timeout)
//!  │                               │
//!  └────────── log, wait ◀─────────┘
//! ```
//!
//! Each tick makes exactly one attempt. Failures are logged and the loop
//! moves on to the next tick; nothing is retried and nothing is fatal.
//!
//! ## Stopping
//!
//! The stop signal races the timer while waiting and races the attempt
//! while one is in flight. When both are ready at once, stop wins. An
//! in-flight attempt is abandoned, so the loop never outlives the signal by
//! more than one tick even when the exchange timeout is longer.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{ClientConfig, DEFAULT_REPORT_INTERVAL};
use crate::error::{Error, Result};
use crate::protocol::{Request, Response, read_message, write_message};

/// Default bound on one dial + request + response exchange
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Periodic identity reporter
#[derive(Debug, Clone)]
pub struct Reporter {
    /// Server host:port
    target: String,

    /// Name announced on every report
    identity: String,

    /// Time between reports
    interval: Duration,

    /// Bound on a single exchange
    timeout: Duration,
}

/// Outcome of waiting for the next loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Fire,
    Stop,
}

impl Reporter {
    /// A zero `interval` falls back to [`DEFAULT_REPORT_INTERVAL`]
    pub fn new(
        target: impl Into<String>,
        identity: impl Into<String>,
        interval: Duration,
    ) -> Self {
        let interval = if interval.is_zero() {
            warn!(
                "Reporting interval must be non-zero, using {:?}",
                DEFAULT_REPORT_INTERVAL
            );
            DEFAULT_REPORT_INTERVAL
        } else {
            interval
        };

        Self {
            target: target.into(),
            identity: identity.into(),
            interval,
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }

    /// Build a reporter from the `client` configuration section
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.dial_addr(), config.name.clone(), config.interval())
            .with_timeout(config.timeout()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Make one report: dial, send, await the response
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the exchange does not finish in time
    /// - [`Error::Network`] / [`Error::Protocol`] on transport failures
    /// - [`Error::Protocol`] if the server answers with a non-success status
    pub async fn report_once(&self) -> Result<()> {
        let response = tokio::time::timeout(self.timeout, self.exchange())
            .await
            .map_err(|_| {
                Error::timeout(format!(
                    "no response from {} within {:?}",
                    self.target, self.timeout
                ))
            })??;

        if response.stat.is_success() {
            Ok(())
        } else {
            Err(Error::protocol(format!(
                "server {} answered with status '{}'",
                self.target, response.stat
            )))
        }
    }

    async fn exchange(&self) -> Result<Response> {
        let mut stream = TcpStream::connect(&self.target).await?;
        let request = Request::report_address(&self.identity)?;
        write_message(&mut stream, &request).await?;
        read_message(&mut stream).await
    }

    /// Report on every tick until `shutdown_rx` fires or its sender is dropped
    ///
    /// The first report goes out one full interval after the call.
    pub async fn run(&self, mut shutdown_rx: oneshot::Receiver<()>) {
        info!(
            "Reporting as {} to {} every {:?}",
            self.identity, self.target, self.interval
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while next_tick(&mut shutdown_rx, &mut ticker).await == Tick::Fire {
            tokio::select! {
                biased;

                _ = &mut shutdown_rx => {
                    debug!("Stop signal abandoned the report in flight");
                    break;
                }

                result = self.report_once() => match result {
                    Ok(()) => debug!("Reported {} to {}", self.identity, self.target),
                    Err(Error::Protocol(msg)) => warn!("Report rejected: {}", msg),
                    Err(e) => error!("Report to {} failed: {}", self.target, e),
                },
            }
        }

        info!("Reporter for {} stopped", self.identity);
    }

    /// Run the loop on its own task
    pub fn start(self) -> ReporterHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(async move { self.run(shutdown_rx).await });
        ReporterHandle {
            shutdown_tx: Some(shutdown_tx),
            join,
        }
    }
}

/// Wait for whichever comes first; stop wins a tie
async fn next_tick(shutdown_rx: &mut oneshot::Receiver<()>, ticker: &mut Interval) -> Tick {
    tokio::select! {
        biased;

        _ = shutdown_rx => Tick::Stop,
        _ = ticker.tick() => Tick::Fire,
    }
}

/// Handle to a reporter running on its own task
pub struct ReporterHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl ReporterHandle {
    /// Signal the loop and wait for it to exit
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.join
            .await
            .map_err(|e| Error::Other(format!("reporter task panicked: {}", e)))
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(period: Duration) -> Interval {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    #[tokio::test(start_paused = true)]
    async fn tick_fires_after_one_interval() {
        let (_tx, mut rx) = oneshot::channel();
        let mut ticker = ticker(Duration::from_secs(60));
        let start = Instant::now();

        assert_eq!(next_tick(&mut rx, &mut ticker).await, Tick::Fire);
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_wins_when_both_are_ready() {
        let (tx, mut rx) = oneshot::channel();
        let mut ticker = ticker(Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(61)).await;
        tx.send(()).unwrap();

        assert_eq!(next_tick(&mut rx, &mut ticker).await, Tick::Stop);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_the_wait() {
        let (tx, mut rx) = oneshot::channel();
        let mut ticker = ticker(Duration::from_secs(3600));
        let start = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            let _ = tx.send(());
        });

        assert_eq!(next_tick(&mut rx, &mut ticker).await, Tick::Stop);
        assert!(start.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_stops_the_loop() {
        let (tx, mut rx) = oneshot::channel::<()>();
        let mut ticker = ticker(Duration::from_secs(60));
        drop(tx);

        assert_eq!(next_tick(&mut rx, &mut ticker).await, Tick::Stop);
    }

    #[test]
    fn from_config_uses_client_settings() {
        let config = ClientConfig::new("alice")
            .with_dial_addr("192.0.2.1:49164")
            .with_interval("30s");
        let reporter = Reporter::from_config(&config).unwrap();

        assert_eq!(reporter.identity(), "alice");
        assert_eq!(reporter.target(), "192.0.2.1:49164");
        assert_eq!(reporter.interval(), Duration::from_secs(30));
    }

    #[test]
    fn from_config_falls_back_to_default_interval() {
        let config = ClientConfig::new("alice").with_interval("soon");
        let reporter = Reporter::from_config(&config).unwrap();
        assert_eq!(reporter.interval(), DEFAULT_REPORT_INTERVAL);
    }

    #[test]
    fn zero_interval_falls_back_to_default() {
        let reporter = Reporter::new("127.0.0.1:1", "alice", Duration::ZERO);
        assert_eq!(reporter.interval(), DEFAULT_REPORT_INTERVAL);
    }

    #[tokio::test]
    async fn zero_interval_loop_starts_and_stops() {
        let handle = Reporter::new("127.0.0.1:1", "alice", Duration::ZERO).start();
        assert!(handle.stop().await.is_ok());
    }

    #[test]
    fn from_config_rejects_empty_name() {
        let res = Reporter::from_config(&ClientConfig::new(""));
        assert!(matches!(res, Err(Error::Config(_))));
    }
}
