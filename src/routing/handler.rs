//! Opaque plane handlers.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

/// Request processor owned by a plane.
///
/// The routing layer never looks inside; it only forwards requests. Cloning
/// is cheap and every clone is the same handler.
#[derive(Clone)]
pub struct Handler {
    name: Arc<str>,
    router: Router,
}

impl Handler {
    /// Wrap a router under a human-readable name.
    pub fn new(name: impl Into<Arc<str>>, router: Router) -> Self {
        Self {
            name: name.into(),
            router,
        }
    }

    /// Name for logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process one request. Failures are the handler's to turn into responses.
    pub async fn call(&self, request: Request<Body>) -> Response {
        match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler").field("name", &self.name).finish()
    }
}
