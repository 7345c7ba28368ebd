//! Default admin plane handler.
//!
//! Serves operational endpoints on the admin listeners:
//! - `GET /ping` — liveness
//! - `GET /healthcheck` — status, version and uptime as JSON
//! - `GET /metrics` — Prometheus exposition (404 when metrics are disabled)

pub mod handlers;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use self::handlers::*;
use crate::routing::Handler;

pub use self::handlers::AdminState;

/// Router with the admin endpoints.
pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/healthcheck", get(healthcheck))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The admin router wrapped as the admin plane's handler.
pub fn admin_handler(state: AdminState) -> Handler {
    Handler::new("admin", admin_router(state))
}
