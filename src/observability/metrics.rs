//! Metrics collection and exposition.
//!
//! # Metrics
//! - `listener_connections_total` (counter): accepted connections by scope, listener
//! - `listener_active_connections` (gauge): open connections by scope, listener
//! - `listener_requests_total` (counter): dispatched requests by scope, listener
//! - `thread_pool_min_threads` / `thread_pool_max_threads` (gauge): pool sizing by pool
//! - `routing_invariant_violations_total` (counter): requests from unregistered listeners

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::plane::Plane;

/// Install the global Prometheus recorder.
///
/// The returned handle renders the registry; the default admin handler
/// serves it at `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Named metrics scope of one listener.
#[derive(Debug, Clone)]
pub struct ListenerMetrics {
    scope: &'static str,
    listener: String,
}

impl ListenerMetrics {
    /// Scope for the listener `name` on `plane`.
    pub fn new(plane: Plane, name: impl Into<String>) -> Self {
        Self {
            scope: plane.scope(),
            listener: name.into(),
        }
    }

    /// The plane scope name.
    pub fn scope(&self) -> &'static str {
        self.scope
    }

    /// A connection was accepted.
    pub fn connection_opened(&self) {
        metrics::counter!(
            "listener_connections_total",
            "scope" => self.scope,
            "listener" => self.listener.clone()
        )
        .increment(1);
        metrics::gauge!(
            "listener_active_connections",
            "scope" => self.scope,
            "listener" => self.listener.clone()
        )
        .increment(1.0);
    }

    /// A connection finished.
    pub fn connection_closed(&self) {
        metrics::gauge!(
            "listener_active_connections",
            "scope" => self.scope,
            "listener" => self.listener.clone()
        )
        .decrement(1.0);
    }

    /// A request was handed to the routing layer.
    pub fn request_dispatched(&self) {
        metrics::counter!(
            "listener_requests_total",
            "scope" => self.scope,
            "listener" => self.listener.clone()
        )
        .increment(1);
    }
}

/// Record pool sizing when a pool starts.
pub fn record_pool_started(pool: &str, min_threads: usize, max_threads: usize) {
    metrics::gauge!("thread_pool_min_threads", "pool" => pool.to_owned()).set(min_threads as f64);
    metrics::gauge!("thread_pool_max_threads", "pool" => pool.to_owned()).set(max_threads as f64);
}

/// Record a dispatch for a listener the routing table does not know.
pub fn record_routing_violation() {
    metrics::counter!("routing_invariant_violations_total").increment(1);
}
