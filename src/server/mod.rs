//! Server assembly and lifecycle.
//!
//! # Data Flow
//! ```text
//! ServerConfig + Handlers
//!     → factory.rs (validate, build main pool, assemble planes)
//!     → host.rs (Server: owns pools, listeners, dispatcher)
//!     → Server::start (pools, then listeners)
//!     → Server::stop (listeners, drain, application pool, admin pool)
//! ```
//!
//! # Design Decisions
//! - Build either yields a complete server or an error, never a partial one
//! - The admin pool is registered as a managed pool and stopped last
//! - Start/stop are blocking calls made from outside any runtime

pub mod error;
pub mod factory;
pub mod host;

pub use error::{BuildError, ServerError, ServerResult};
pub use factory::ServerFactory;
pub use host::{Server, ServerState};
