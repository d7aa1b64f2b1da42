//! Live-connection registry
//!
//! Tracks every connection currently owned by a handler task:
//! - The outstanding-handler count drives the shutdown drain
//! - The shutdown flag lives under the same lock, so no connection can be
//!   registered once draining has started
//! - A snapshot of open connections is what gets cancelled when the grace
//!   period runs out

use async_std::channel::{self, Receiver, Sender};
use async_std::future;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};

/// Identity of a registered connection, unique for the life of a registry.
pub type ConnectionId = u64;

/// Which side of the drain race finished first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Every handler deregistered
    Completed,
    /// The timeout elapsed with handlers still registered
    TimedOut,
}

/// Shared set of active connections.
pub struct Registry<C> {
    inner: Arc<Shared<C>>,
}

struct Shared<C> {
    state: Mutex<State<C>>,
    /// Fired whenever the outstanding count drops to zero
    drained_tx: Sender<()>,
    drained_rx: Receiver<()>,
}

struct State<C> {
    connections: HashMap<ConnectionId, C>,
    next_id: ConnectionId,
    shutting_down: bool,
}

impl<C> Registry<C> {
    pub fn new() -> Self {
        let (drained_tx, drained_rx) = channel::bounded(1);
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(State {
                    connections: HashMap::new(),
                    next_id: 0,
                    shutting_down: false,
                }),
                drained_tx,
                drained_rx,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<C>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a connection, returning the guard that removes it again.
    ///
    /// Returns `None` once shutdown has begun.
    pub fn register(&self, conn: C) -> Option<ConnectionGuard<C>> {
        let mut state = self.lock();
        if state.shutting_down {
            return None;
        }

        let id = state.next_id;
        state.next_id += 1;
        state.connections.insert(id, conn);
        let outstanding = state.connections.len();
        drop(state);

        debug!(conn = id, outstanding, "Connection registered");
        Some(ConnectionGuard {
            id,
            registry: self.clone(),
        })
    }

    /// Removes a connection. Returns `false` if it was already gone.
    pub fn deregister(&self, id: ConnectionId) -> bool {
        let mut state = self.lock();
        if state.connections.remove(&id).is_none() {
            return false;
        }
        let outstanding = state.connections.len();
        drop(state);

        debug!(conn = id, outstanding, "Connection deregistered");
        if outstanding == 0 {
            // A full channel already holds a pending wake-up
            let _ = self.inner.drained_tx.try_send(());
        }
        true
    }

    /// Number of connections whose handlers have not finished.
    pub fn outstanding(&self) -> usize {
        self.lock().connections.len()
    }

    /// Sets the shutdown flag. Returns `true` only for the call that set it.
    pub fn begin_shutdown(&self) -> bool {
        let mut state = self.lock();
        !std::mem::replace(&mut state.shutting_down, true)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    /// Waits until no connections are registered or `timeout` elapses.
    pub async fn await_drain(&self, timeout: Duration) -> Drain {
        let drained = async {
            loop {
                let outstanding = self.outstanding();
                if outstanding == 0 {
                    return;
                }
                trace!(outstanding, "Waiting for connections to drain");
                if self.inner.drained_rx.recv().await.is_err() {
                    return;
                }
            }
        };

        match future::timeout(timeout, drained).await {
            Ok(()) => Drain::Completed,
            Err(_) => Drain::TimedOut,
        }
    }
}

impl<C: Clone> Registry<C> {
    /// Handles to every registered connection, in registration order.
    pub fn snapshot(&self) -> Vec<(ConnectionId, C)> {
        let mut connections: Vec<_> = self
            .lock()
            .connections
            .iter()
            .map(|(id, conn)| (*id, conn.clone()))
            .collect();
        connections.sort_by_key(|(id, _)| *id);
        connections
    }
}

impl<C> Clone for Registry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a connection registered for as long as its handler runs.
///
/// Dropping the guard deregisters the connection, whichever way the handler
/// exits.
pub struct ConnectionGuard<C> {
    id: ConnectionId,
    registry: Registry<C>,
}

impl<C> ConnectionGuard<C> {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<C> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}
