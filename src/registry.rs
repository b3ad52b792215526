//! Deterministic cleanup of broker connections opened during a unit of work.

use crate::amqp::BrokerConnection;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Tracks the connections opened during a unit of work - a test run, a
/// process lifetime - so they can all be closed at teardown.
///
/// The registry is owned by whichever collaborator bootstraps connections;
/// it is shared state, but registration and close-all are its only mutating
/// operations and both are serialised by an internal lock.
pub struct ConnectionRegistry<C: BrokerConnection> {
    connections: Mutex<Vec<Arc<C>>>,
}

impl<C: BrokerConnection> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: BrokerConnection> ConnectionRegistry<C> {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Record a connection for later cleanup.
    ///
    /// Duplicates are tolerated: registering the same connection twice means
    /// closing it twice on teardown, which the transport treats as a no-op.
    pub fn register(&self, connection: Arc<C>) {
        self.connections
            .lock()
            .expect("connection registry lock poisoned")
            .push(connection);
    }

    /// The number of connections currently registered.
    pub fn len(&self) -> usize {
        self.connections
            .lock()
            .expect("connection registry lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every recorded connection, in registration order, and clear the
    /// registry.
    ///
    /// Cleanup is best-effort: an individual close failure is logged and
    /// collected, and the remaining connections are still closed. The
    /// returned failures make the aggregate observable for test-environment
    /// diagnostics.
    pub async fn close_all(&self) -> Vec<lapin::Error> {
        let drained: Vec<Arc<C>> = {
            let mut connections = self
                .connections
                .lock()
                .expect("connection registry lock poisoned");
            connections.drain(..).collect()
        };

        let mut failures = Vec::new();
        for connection in drained {
            if let Err(error) = connection.close().await {
                warn!(error = %error, "failed to close a registered AMQP connection");
                failures.push(error);
            }
        }
        failures
    }
}
