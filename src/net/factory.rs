//! Listener construction.
//!
//! # Responsibilities
//! - Resolve the configured bind address
//! - Create and bind the socket (reuse address, backlog) without accepting
//! - Attach the plane's pool and metrics scope
//!
//! # Design Decisions
//! - One `ListenerFactory` impl per transport; callers only see the trait
//! - Bind errors are returned as-is, never retried
//! - TLS material is checked here and loaded when the listener starts

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::{HttpListenerSpec, HttpsListenerSpec, ListenerSpec};
use crate::net::listener::{BoundListener, ListenerError, Transport};
use crate::net::tls::check_tls_files;
use crate::plane::Plane;
use crate::pool::ThreadPool;

/// What a factory binds a listener to.
#[derive(Debug, Clone)]
pub struct ListenerContext {
    /// Plane the listener serves; names its metrics scope.
    pub plane: Plane,
    /// Pool that will run the listener's work.
    pub pool: Arc<ThreadPool>,
}

impl ListenerContext {
    pub fn new(plane: Plane, pool: Arc<ThreadPool>) -> Self {
        Self { plane, pool }
    }
}

/// Builds a bound, not-yet-started listener.
pub trait ListenerFactory {
    /// Bind a listener for `ctx`. The same spec and pool always yield an
    /// equivalent listener.
    fn build(&self, ctx: &ListenerContext) -> Result<BoundListener, ListenerError>;
}

impl ListenerFactory for ListenerSpec {
    fn build(&self, ctx: &ListenerContext) -> Result<BoundListener, ListenerError> {
        match self {
            ListenerSpec::Http(spec) => spec.build(ctx),
            ListenerSpec::Https(spec) => spec.build(ctx),
        }
    }
}

impl ListenerFactory for HttpListenerSpec {
    fn build(&self, ctx: &ListenerContext) -> Result<BoundListener, ListenerError> {
        bind_listener(self, ctx, Transport::Plain)
    }
}

impl ListenerFactory for HttpsListenerSpec {
    fn build(&self, ctx: &ListenerContext) -> Result<BoundListener, ListenerError> {
        check_tls_files(&self.cert_path, &self.key_path).map_err(|source| ListenerError::Tls {
            listener: format!("{}@{}:{}", ctx.plane, self.http.host(), self.http.port),
            source,
        })?;
        bind_listener(
            &self.http,
            ctx,
            Transport::Tls {
                cert_path: self.cert_path.clone(),
                key_path: self.key_path.clone(),
            },
        )
    }
}

fn bind_listener(
    spec: &HttpListenerSpec,
    ctx: &ListenerContext,
    transport: Transport,
) -> Result<BoundListener, ListenerError> {
    let addr = resolve(spec)?;
    let socket = bind_socket(addr, spec).map_err(|source| ListenerError::Bind {
        address: addr.to_string(),
        source,
    })?;
    let local_addr = socket.local_addr().map_err(|source| ListenerError::Bind {
        address: addr.to_string(),
        source,
    })?;

    let listener = BoundListener::new(
        ctx.plane,
        Arc::clone(&ctx.pool),
        socket,
        local_addr,
        spec.host(),
        transport,
        spec.max_connections,
        Duration::from_secs(spec.idle_timeout_secs),
    );

    tracing::info!(
        listener = %listener.name(),
        address = %local_addr,
        transport = ?listener.transport(),
        pool = %ctx.pool.name(),
        "Listener bound"
    );
    Ok(listener)
}

fn resolve(spec: &HttpListenerSpec) -> Result<SocketAddr, ListenerError> {
    let address = format!("{}:{}", spec.host(), spec.port);
    (spec.host(), spec.port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            address: address.clone(),
            source,
        })?
        .next()
        .ok_or_else(|| ListenerError::Resolve {
            address,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
        })
}

fn bind_socket(addr: SocketAddr, spec: &HttpListenerSpec) -> std::io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(spec.reuse_address)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(i32::try_from(spec.accept_queue_size).unwrap_or(i32::MAX))?;
    Ok(socket.into())
}
