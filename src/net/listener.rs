//! Bound listeners and their accept loops.
//!
//! # Responsibilities
//! - Hold a bound socket until the server starts it
//! - Run the accept loop on the plane's pool
//! - Enforce max_connections via semaphore
//! - Tag every request with the accepting listener and hand it to the dispatcher
//! - Stop accepting on stop, finish connections gracefully on drain

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::response::Response;
use axum_server::accept::Accept;
use axum_server::tls_rustls::RustlsAcceptor;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::net::connection::ConnectionTracker;
use crate::net::tls::load_tls_config;
use crate::observability::metrics::ListenerMetrics;
use crate::plane::Plane;
use crate::pool::{PoolError, ThreadPool};
use crate::routing::{DispatchError, Dispatcher};

/// Retry delay after an accept error that is not specific to one peer.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Global counter for listener identities.
static LISTENER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a bound listener.
///
/// Inserted into every request the listener accepts; the routing table is
/// keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocate a new identity.
    pub fn new() -> Self {
        Self(LISTENER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The bind host did not resolve.
    #[error("failed to resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The socket could not be bound (address in use, permission denied).
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Certificates missing or unreadable.
    #[error("TLS setup failed for {listener}: {source}")]
    Tls {
        listener: String,
        #[source]
        source: std::io::Error,
    },

    /// The socket was already handed to an accept loop.
    #[error("listener {0} was already started")]
    AlreadyStarted(String),

    /// The listener's pool is not running.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// How accepted streams are wrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Plain TCP.
    Plain,
    /// TLS, certificates loaded at start.
    Tls { cert_path: PathBuf, key_path: PathBuf },
}

/// Everything a started listener needs from the server.
#[derive(Clone)]
pub struct ServeContext {
    /// The composite handler.
    pub dispatcher: Dispatcher,
    /// Open-connection count shared by every listener.
    pub tracker: ConnectionTracker,
    /// Flips to `true` when accepting must stop.
    pub stop: watch::Receiver<bool>,
    /// Flips to `true` when open connections must wind down.
    pub drain: watch::Receiver<bool>,
}

/// A bound, not-yet-accepting network listener of one plane.
pub struct BoundListener {
    id: ListenerId,
    name: String,
    plane: Plane,
    local_addr: SocketAddr,
    pool: Arc<ThreadPool>,
    transport: Transport,
    max_connections: usize,
    idle_timeout: Duration,
    metrics: ListenerMetrics,
    socket: Mutex<Option<std::net::TcpListener>>,
}

impl BoundListener {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        plane: Plane,
        pool: Arc<ThreadPool>,
        socket: std::net::TcpListener,
        local_addr: SocketAddr,
        host: &str,
        transport: Transport,
        max_connections: usize,
        idle_timeout: Duration,
    ) -> Self {
        let name = format!("{}@{}:{}", plane.scope(), host, local_addr.port());
        let metrics = ListenerMetrics::new(plane, name.clone());
        Self {
            id: ListenerId::new(),
            name,
            plane,
            local_addr,
            pool,
            transport,
            max_connections,
            idle_timeout,
            metrics,
            socket: Mutex::new(Some(socket)),
        }
    }

    /// Identity used as the routing key.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// `"<scope>@<host>:<port>"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The plane this listener serves.
    pub fn plane(&self) -> Plane {
        self.plane
    }

    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The pool this listener was built against.
    pub fn pool(&self) -> &Arc<ThreadPool> {
        &self.pool
    }

    /// Transport wrapping accepted streams.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Configured maximum concurrent connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Whether the socket has been handed to an accept loop.
    pub fn is_started(&self) -> bool {
        self.lock_socket().is_none()
    }

    /// Start accepting on the listener's pool.
    ///
    /// Called from outside any runtime. The returned handle completes once
    /// the accept loop has stopped and the socket is closed.
    pub fn start(&self, ctx: ServeContext) -> Result<JoinHandle<()>, ListenerError> {
        let handle = self.pool.handle()?;

        let std_listener = self
            .lock_socket()
            .take()
            .ok_or_else(|| ListenerError::AlreadyStarted(self.name.clone()))?;

        let tls = match &self.transport {
            Transport::Plain => None,
            Transport::Tls {
                cert_path,
                key_path,
            } => {
                let config = handle
                    .block_on(load_tls_config(cert_path, key_path))
                    .map_err(|source| ListenerError::Tls {
                        listener: self.name.clone(),
                        source,
                    })?;
                Some(RustlsAcceptor::new(config))
            }
        };

        let listener = {
            let _guard = handle.enter();
            TcpListener::from_std(std_listener).map_err(|source| ListenerError::Bind {
                address: self.local_addr.to_string(),
                source,
            })?
        };

        let acceptor = AcceptLoop {
            name: self.name.clone(),
            connection_limit: Arc::new(Semaphore::new(self.max_connections)),
            tls,
            tracker: ctx.tracker.clone(),
            stop: ctx.stop.clone(),
            drain: ctx.drain.clone(),
            connection: Arc::new(ConnectionContext {
                listener: self.id,
                pool: Arc::clone(&self.pool),
                metrics: self.metrics.clone(),
                dispatcher: ctx.dispatcher,
                idle_timeout: self.idle_timeout,
            }),
        };

        tracing::info!(
            listener = %self.name,
            address = %self.local_addr,
            pool = %self.pool.name(),
            max_connections = self.max_connections,
            "Listener started"
        );

        Ok(handle.spawn(acceptor.run(listener)))
    }

    fn lock_socket(&self) -> std::sync::MutexGuard<'_, Option<std::net::TcpListener>> {
        self.socket.lock().expect("listener socket mutex poisoned")
    }
}

impl std::fmt::Debug for BoundListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundListener")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("plane", &self.plane)
            .field("local_addr", &self.local_addr)
            .field("pool", &self.pool.name())
            .finish()
    }
}

/// Per-listener state shared by all of its connections.
struct ConnectionContext {
    listener: ListenerId,
    pool: Arc<ThreadPool>,
    metrics: ListenerMetrics,
    dispatcher: Dispatcher,
    idle_timeout: Duration,
}

impl ConnectionContext {
    async fn handle(&self, request: Request<Incoming>) -> Result<Response, DispatchError> {
        let _work = self
            .pool
            .acquire()
            .await
            .map_err(|_| DispatchError::PoolClosed(self.pool.name().to_owned()))?;

        let mut request = request.map(Body::new);
        request.extensions_mut().insert(self.listener);
        self.metrics.request_dispatched();

        self.dispatcher.dispatch(request).await
    }
}

struct AcceptLoop {
    name: String,
    connection_limit: Arc<Semaphore>,
    tls: Option<RustlsAcceptor>,
    tracker: ConnectionTracker,
    stop: watch::Receiver<bool>,
    drain: watch::Receiver<bool>,
    connection: Arc<ConnectionContext>,
}

impl AcceptLoop {
    async fn run(mut self, listener: TcpListener) {
        loop {
            if *self.stop.borrow_and_update() {
                break;
            }

            // Acquire permit first (backpressure)
            let permit = tokio::select! {
                _ = self.stop.changed() => break,
                permit = self.connection_limit.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (stream, peer_addr) = tokio::select! {
                _ = self.stop.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        let Some(delay) = accept_backoff(&e) else {
                            tracing::debug!(listener = %self.name, error = %e, "Accept failed");
                            continue;
                        };
                        tracing::warn!(
                            listener = %self.name,
                            error = %e,
                            retry_in = ?delay,
                            "Accept failed, backing off"
                        );
                        drop(permit);
                        tokio::select! {
                            _ = self.stop.changed() => break,
                            _ = tokio::time::sleep(delay) => continue,
                        }
                    }
                },
            };

            tracing::debug!(
                listener = %self.name,
                peer_addr = %peer_addr,
                available_permits = self.connection_limit.available_permits(),
                "Connection accepted"
            );

            self.spawn_connection(stream, permit);
        }

        drop(listener);
        tracing::info!(listener = %self.name, "Listener stopped");
    }

    fn spawn_connection(&self, stream: TcpStream, permit: OwnedSemaphorePermit) {
        let guard = self.tracker.track(self.connection.metrics.clone());
        let connection = Arc::clone(&self.connection);
        let drain = self.drain.clone();
        let tls = self.tls.clone();
        let name = self.name.clone();

        // The accept loop runs on the plane's runtime, so this lands there too.
        tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            match tls {
                None => serve_connection(stream, connection, drain).await,
                Some(acceptor) => match acceptor.accept(stream, ()).await {
                    Ok((stream, ())) => serve_connection(stream, connection, drain).await,
                    Err(e) => {
                        tracing::debug!(listener = %name, error = %e, "TLS handshake failed");
                    }
                },
            }
        });
    }
}

/// Pause before retrying an accept that failed with `error`.
///
/// Errors tied to a single peer are retried at once. Anything else (EMFILE,
/// ENFILE, ENOBUFS, ...) fails again immediately until resources free up.
fn accept_backoff(error: &std::io::Error) -> Option<Duration> {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset => {
            None
        }
        _ => Some(ACCEPT_BACKOFF),
    }
}

async fn serve_connection<I>(
    io: I,
    connection: Arc<ConnectionContext>,
    mut drain: watch::Receiver<bool>,
) where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let idle_timeout = connection.idle_timeout;
    let service = service_fn(move |request: Request<Incoming>| {
        let connection = Arc::clone(&connection);
        async move { connection.handle(request).await }
    });

    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(idle_timeout);

    let conn = builder.serve_connection(TokioIo::new(io), service);
    tokio::pin!(conn);

    if *drain.borrow_and_update() {
        conn.as_mut().graceful_shutdown();
    }

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                tracing::debug!(error = %e, "Connection ended with error");
            }
        }
        _ = drain.changed() => {
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.as_mut().await {
                tracing::debug!(error = %e, "Connection ended with error while draining");
            }
        }
    }
}
