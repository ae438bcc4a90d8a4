//! One connection = one request, one response, then close.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use super::Server;
use crate::protocol::{Command, Request, Response, read_message, write_message};
use crate::registry::host_of;

impl Server {
    /// Serve a single accepted connection
    ///
    /// Every failure here is logged and ends this connection only.
    pub(super) async fn handle_connection(self: Arc<Self>, mut stream: TcpStream, peer: SocketAddr) {
        let request: Request =
            match tokio::time::timeout(self.read_timeout, read_message(&mut stream)).await {
                Ok(Ok(request)) => request,
                Ok(Err(e)) => {
                    warn!("Dropping connection from {}: {}", peer, e);
                    return;
                }
                Err(_) => {
                    warn!(
                        "Dropping connection from {}: no request within {:?}",
                        peer, self.read_timeout
                    );
                    return;
                }
            };

        let response = match &request.cmd {
            Command::ReportAddress => self.handle_report_address(&request, peer).await,
            Command::Other(cmd) => {
                // No structured error reply exists for unknown commands
                warn!("Unknown command '{}' from {}, closing connection", cmd, peer);
                return;
            }
        };

        if let Err(e) = write_message(&mut stream, &response).await {
            error!("Failed to send response to {}: {}", peer, e);
        }
    }

    /// Change-detect, then reconcile and persist when the host moved
    async fn handle_report_address(&self, request: &Request, peer: SocketAddr) -> Response {
        let name: String = match request.payload() {
            Ok(name) => name,
            Err(e) => {
                warn!("Bad report from {}: {}", peer, e);
                return Response::failure();
            }
        };

        let changed = match self.registry.observe(&name, peer) {
            Ok(changed) => changed,
            Err(e) => {
                warn!("Rejected report from {}: {}", peer, e);
                return Response::failure();
            }
        };
        info!("Client {} reported from {} (changed: {})", name, peer, changed);

        if !changed {
            return Response::success();
        }

        let host = host_of(&peer);

        match self.reconciler.upsert_address(&name, host).await {
            Ok(outcome) => debug!("Reconciled {}: {:?}", name, outcome),
            Err(e) => {
                error!(
                    "Failed to reconcile {} -> {} via {}: {}",
                    name,
                    host,
                    self.reconciler.provider_name(),
                    e
                );
                // Let the next report from this host try again
                self.registry.invalidate(&name, peer);
            }
        }

        if let Err(e) = self
            .sink
            .insert_observed_address(&name, &host.to_string())
            .await
        {
            error!(
                "Failed to record {} -> {} in {} sink: {}",
                name,
                host,
                self.sink.sink_name(),
                e
            );
        }

        Response::success()
    }
}
