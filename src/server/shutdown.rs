//! Graceful shutdown with connection draining
//!
//! Stopping the server closes the listener, then gives in-flight connections
//! a grace period to finish. Whatever is still registered when it runs out is
//! sent a `Cancelled` rejection and closed.

use super::Server;
use crate::net::{Connection, Listener};
use crate::registry::Drain;
use crate::response::Response;
use async_std::io;
use std::time::Duration;
use tracing::{error, info, warn};

/// Upper bound on delivering the cancellation line to one connection.
const CANCEL_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// How a call to [`Server::stop`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Every connection finished within the grace period
    Graceful,
    /// The grace period expired and these connections were cancelled
    Cancelled { connections: usize },
    /// Shutdown had already been started by an earlier call
    AlreadyStopped,
}

impl<L: Listener> Server<L> {
    /// Stop accepting, drain in-flight connections for up to `grace_period`,
    /// then cancel whatever is left.
    pub async fn stop(&self, grace_period: Duration) -> Shutdown {
        if !self.registry.begin_shutdown() {
            warn!("Shutdown already in progress");
            return Shutdown::AlreadyStopped;
        }

        info!(
            ?grace_period,
            outstanding = self.registry.outstanding(),
            "Stopping service"
        );
        if let Err(err) = self.listener.close() {
            error!(error = %err, "Error closing listener");
        }

        match self.registry.await_drain(grace_period).await {
            Drain::Completed => {
                info!("All connections completed gracefully");
                Shutdown::Graceful
            }
            Drain::TimedOut => {
                info!("Grace period finished for active requests, cancelling pending requests");
                let connections = self.cancel_connections().await;
                Shutdown::Cancelled { connections }
            }
        }
    }

    /// Send a cancellation to every registered connection and close it,
    /// whether or not the send worked.
    async fn cancel_connections(&self) -> usize {
        let connections = self.registry.snapshot();
        let cancelled = Response::cancelled().to_string();

        for (id, conn) in &connections {
            let sent = io::timeout(CANCEL_WRITE_TIMEOUT, conn.write_line(&cancelled)).await;
            if let Err(err) = sent {
                error!(conn = id, error = %err, "Error sending cancelled response");
            }
            if let Err(err) = conn.close() {
                error!(conn = id, error = %err, "Error closing connection");
            }
        }

        info!(cancelled = connections.len(), "Cancelled pending requests");
        connections.len()
    }
}
