//! Server module for running the payment simulator
//!
//! Provides:
//! - The accept loop, one handler task per connection
//! - Connection registration for draining
//! - Graceful shutdown with forced cancellation after a grace period

mod handler;
mod shutdown;

pub use shutdown::Shutdown;

use crate::error::{Error, Result};
use crate::net::{Connection, Listener, ListenerFactory};
use crate::payment::Processor;
use crate::registry::Registry;
use async_std::net::SocketAddr;
use async_std::task;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// A payment simulator bound to a listening socket.
pub struct Server<L: Listener> {
    listener: L,
    registry: Registry<L::Conn>,
    processor: Arc<dyn Processor>,
}

impl<L: Listener> Server<L> {
    /// Create a server around an already listening socket
    pub fn new(listener: L, processor: Arc<dyn Processor>) -> Self {
        Self {
            listener,
            registry: Registry::new(),
            processor,
        }
    }

    /// Bind a listener on `addr` and create a server for it
    pub async fn bind<F>(factory: &F, addr: &str, processor: Arc<dyn Processor>) -> Result<Self>
    where
        F: ListenerFactory<Listener = L>,
    {
        let listener = factory.bind(addr).await.map_err(|source| {
            error!(%addr, error = %source, "Error listening on address");
            Error::Bind {
                addr: addr.to_owned(),
                source,
            }
        })?;
        Ok(Self::new(listener, processor))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The connections currently being served
    pub fn registry(&self) -> &Registry<L::Conn> {
        &self.registry
    }

    /// Run the accept loop until the server is stopped.
    ///
    /// Accept errors are retried unless shutdown has begun, in which case the
    /// error is the closed listener and the loop returns.
    pub async fn run(&self) {
        info!("Starting service");
        loop {
            match self.listener.accept().await {
                Ok(conn) => self.dispatch(conn),
                Err(err) => {
                    if self.registry.is_shutting_down() {
                        debug!(error = %err, "Listener closed");
                        break;
                    }
                    error!(error = %err, "Error accepting connection");
                    task::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
        info!("Accept loop stopped");
    }

    fn dispatch(&self, conn: L::Conn) {
        let peer = conn.peer_addr();
        let Some(guard) = self.registry.register(conn.clone()) else {
            debug!(?peer, "Shutdown in progress, closing new connection");
            if let Err(err) = conn.close() {
                debug!(?peer, error = %err, "Error closing refused connection");
            }
            return;
        };

        info!(conn = guard.id(), ?peer, "Accepted new connection");
        task::spawn(handler::handle_connection(
            conn,
            guard,
            self.processor.clone(),
        ));
    }
}
