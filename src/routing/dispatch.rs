//! The composite handler registered on the transport layer.
//!
//! Listeners tag each request with their [`ListenerId`]; the dispatcher
//! resolves the tag through the [`RoutingTable`] and forwards the request
//! unchanged to the plane's handler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use thiserror::Error;

use crate::lifecycle::Shutdown;
use crate::net::ListenerId;
use crate::observability::metrics;
use crate::routing::{RoutingError, RoutingTable};

/// Error type for dispatch.
///
/// Handler failures never show up here; handlers answer with responses.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request carries no listener tag. Wiring defect, fatal.
    #[error("routing invariant violated: request carries no listener tag")]
    Untagged,

    /// The tagging listener has no route. Wiring defect, fatal.
    #[error("routing invariant violated: {0}")]
    Unrouted(#[source] RoutingError),

    /// The plane's pool is shutting down and takes no new work.
    #[error("pool '{0}' is shutting down")]
    PoolClosed(String),
}

impl DispatchError {
    /// Whether the error reveals a broken server rather than a transient state.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, DispatchError::Untagged | DispatchError::Unrouted(_))
    }
}

/// Single entry point for requests from every listener of both planes.
#[derive(Clone)]
pub struct Dispatcher {
    table: Arc<RoutingTable>,
    shutdown: Shutdown,
}

impl Dispatcher {
    /// Dispatch through `table`; invariant violations trigger `shutdown`.
    pub fn new(table: Arc<RoutingTable>, shutdown: Shutdown) -> Self {
        Self { table, shutdown }
    }

    /// The routing table behind this dispatcher.
    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Forward a tagged request to its plane's handler.
    pub async fn dispatch(&self, request: Request<Body>) -> Result<Response, DispatchError> {
        let Some(&listener) = request.extensions().get::<ListenerId>() else {
            return Err(self.violation(DispatchError::Untagged));
        };

        let entry = match self.table.route(listener) {
            Ok(entry) => entry,
            Err(err) => return Err(self.violation(DispatchError::Unrouted(err))),
        };

        tracing::trace!(
            listener = %entry.name,
            plane = %entry.plane,
            handler = entry.handler.name(),
            "Dispatching request"
        );
        Ok(entry.handler.call(request).await)
    }

    fn violation(&self, err: DispatchError) -> DispatchError {
        tracing::error!(error = %err, "Fatal routing defect, shutting the server down");
        metrics::record_routing_violation();
        self.shutdown.trigger();
        err
    }
}

impl tower::Service<Request<Body>> for Dispatcher {
    type Response = Response;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<Response, DispatchError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { dispatcher.dispatch(request).await })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpListenerSpec;
    use crate::net::{BoundListener, ListenerContext, ListenerFactory};
    use crate::plane::Plane;
    use crate::pool::ThreadPool;
    use crate::routing::Handler;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn bind(plane: Plane, pool: &Arc<ThreadPool>) -> BoundListener {
        let spec = HttpListenerSpec {
            bind_host: Some("127.0.0.1".to_string()),
            ..HttpListenerSpec::with_port(0)
        };
        spec.build(&ListenerContext::new(plane, Arc::clone(pool)))
            .unwrap()
    }

    fn named(body: &'static str) -> Handler {
        Handler::new(body, Router::new().route("/", get(move || async move { body })))
    }

    fn tagged(listener: ListenerId) -> Request<Body> {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        request.extensions_mut().insert(listener);
        request
    }

    async fn body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn setup() -> (Dispatcher, Shutdown, BoundListener, BoundListener) {
        let pool = Arc::new(ThreadPool::build(1, 2, "t").unwrap());
        let app = bind(Plane::Application, &pool);
        let admin = bind(Plane::Admin, &pool);
        let table =
            RoutingTable::build([(&app, named("application")), (&admin, named("admin"))]).unwrap();
        let shutdown = Shutdown::new();
        let dispatcher = Dispatcher::new(Arc::new(table), shutdown.clone());
        (dispatcher, shutdown, app, admin)
    }

    #[tokio::test]
    async fn reaches_the_listeners_handler() {
        let (dispatcher, shutdown, app, admin) = setup();

        let response = dispatcher.dispatch(tagged(app.id())).await.unwrap();
        assert_eq!(body(response).await, "application");

        let response = dispatcher.clone().oneshot(tagged(admin.id())).await.unwrap();
        assert_eq!(body(response).await, "admin");

        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn unregistered_listener_is_fatal() {
        let (dispatcher, shutdown, _app, _admin) = setup();
        let stranger = ListenerId::new();

        let err = dispatcher.dispatch(tagged(stranger)).await.unwrap_err();
        assert!(err.is_invariant_violation());
        assert!(matches!(
            err,
            DispatchError::Unrouted(RoutingError::UnregisteredListener(id)) if id == stranger
        ));
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn untagged_request_is_fatal() {
        let (dispatcher, shutdown, _app, _admin) = setup();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let err = dispatcher.dispatch(request).await.unwrap_err();
        assert!(matches!(err, DispatchError::Untagged));
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn closed_pool_is_not_a_violation() {
        assert!(!DispatchError::PoolClosed("app".into()).is_invariant_violation());
    }
}
