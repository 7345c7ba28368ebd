//! Server error types.

use thiserror::Error;

use crate::config::ValidationError;
use crate::net::ListenerError;
use crate::plane::Plane;
use crate::pool::PoolError;
use crate::routing::RoutingError;

/// Errors that abort building a server. No partial server is ever returned.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Configuration rejected by validation.
    #[error("invalid configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Config(Vec<ValidationError>),

    /// A pool could not be built.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// A listener could not be built.
    #[error("{plane} listener #{index}: {source}")]
    Listener {
        plane: Plane,
        index: usize,
        #[source]
        source: ListenerError,
    },

    /// The routing table could not be built.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Neither plane has a listener.
    #[error("no plane has a listener; the server would be unreachable")]
    NoReachablePlane,
}

/// Errors from starting or stopping a built server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `start` called on a server that is not freshly built.
    #[error("server cannot start from state {0:?}")]
    InvalidState(crate::server::ServerState),

    /// A pool failed to start.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// A listener failed to start.
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
