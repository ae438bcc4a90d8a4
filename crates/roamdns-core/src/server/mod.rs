//! TCP server: listener lifecycle and per-connection handling
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────┐  accept   ┌──────────────────────┐
//! client ───▶│ accept loop  │──spawn───▶│ connection task      │
//!            └──────────────┘           │  read 1 Request      │
//!                   ▲                   │  registry.observe    │
//!            stop ──┘                   │  reconcile + sink    │
//!                                       │  write 1 Response    │
//!                                       └──────────────────────┘
//! ```
//!
//! ## Shutdown
//!
//! Stopping the server drops the listening socket and ends the accept loop.
//! Connection tasks already spawned are not tracked and keep running to
//! completion on the runtime: shutdown only guarantees that no new
//! connection is accepted.

mod connection;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::reconcile::{DeleteOutcome, Reconciler};
use crate::registry::AddressRegistry;
use crate::traits::AddressSink;

/// Default time a connection gets to deliver its request
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed accept before trying again
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Server state shared by the accept loop and every connection task
pub struct Server {
    /// Name → last observed address
    registry: AddressRegistry,

    /// DNS reconciliation
    reconciler: Reconciler,

    /// History of observed changes
    sink: Arc<dyn AddressSink>,

    /// Per-connection read timeout
    read_timeout: Duration,
}

impl Server {
    /// Create a server with an empty registry
    pub fn new(reconciler: Reconciler, sink: Arc<dyn AddressSink>) -> Self {
        Self {
            registry: AddressRegistry::new(),
            reconciler,
            sink,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Set the per-connection read timeout
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn registry(&self) -> &AddressRegistry {
        &self.registry
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Bind `addr` and start the accept loop on the current runtime
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the address cannot be bound.
    pub async fn bind(self, addr: &str) -> Result<ServerHandle> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::config(format!("cannot listen on {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        let server = Arc::new(self);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(Arc::clone(&server).serve(listener, shutdown_rx));

        Ok(ServerHandle {
            local_addr,
            server,
            shutdown_tx: Some(shutdown_tx),
            join,
        })
    }

    /// Run the accept loop until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// Each accepted connection is handled on its own task. Stop takes
    /// priority over a connection that is ready at the same moment.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<()> {
        info!("Server listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown_rx => {
                    info!("Stop signal received, closing listener");
                    break;
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let server = Arc::clone(&self);
                        tokio::spawn(async move {
                            server.handle_connection(stream, peer).await;
                        });
                    }
                    Err(e) => {
                        error!("Accept failed: {}", e);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        info!("Listener stopped");
        Ok(())
    }

    /// Forget a client: drop its registry entry and delete its DNS record
    pub async fn forget(&self, name: &str) -> Result<DeleteOutcome> {
        if let Some(previous) = self.registry.remove(name) {
            info!("Forgot client {} (last seen at {})", name, previous);
        }
        self.reconciler.delete(name).await
    }
}

/// Handle to a running server
pub struct ServerHandle {
    local_addr: SocketAddr,
    server: Arc<Server>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared server state
    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    /// Stop accepting connections and wait for the accept loop to exit
    ///
    /// In-flight connection tasks are not awaited.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(Error::Other(format!("accept loop panicked: {}", e))),
        }
    }
}
