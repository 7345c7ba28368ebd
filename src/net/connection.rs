//! Open-connection accounting shared by every listener of both planes.
//!
//! The server drains by waiting for the count to reach zero, so every
//! accepted connection holds a [`ConnectionGuard`] for as long as it is served.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::observability::metrics::ListenerMetrics;

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection number, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Count of open connections, observable by drain.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    open: Arc<watch::Sender<u64>>,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self {
            open: Arc::new(watch::Sender::new(0)),
        }
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a freshly accepted connection against `metrics`' listener.
    pub fn track(&self, metrics: ListenerMetrics) -> ConnectionGuard {
        self.open.send_modify(|open| *open += 1);
        metrics.connection_opened();
        ConnectionGuard {
            open: Arc::clone(&self.open),
            id: ConnectionId::next(),
            metrics,
        }
    }

    /// Connections currently open.
    pub fn active_count(&self) -> u64 {
        *self.open.borrow()
    }

    /// Resolve once no connection is open.
    pub async fn wait_until_idle(&self) {
        let mut open = self.open.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = open.wait_for(|count| *count == 0).await;
    }
}

/// Keeps one connection counted until dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    open: Arc<watch::Sender<u64>>,
    id: ConnectionId,
    metrics: ListenerMetrics,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.open.send_modify(|open| *open -= 1);
        self.metrics.connection_closed();
        tracing::trace!(connection = %self.id, scope = self.metrics.scope(), "Connection closed");
    }
}
