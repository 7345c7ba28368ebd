//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerSpec
//!     → factory.rs (resolve, bind via socket2; no accepts yet)
//!     → BoundListener (socket + plane + pool + metrics scope)
//!
//! Server start:
//!     listener.rs (accept loop on the plane's pool, connection limits)
//!     → tls.rs (optional TLS handshake)
//!     → connection.rs (lifecycle tracking for drain)
//!     → hyper connection → routing::Dispatcher
//! ```
//!
//! # Design Decisions
//! - Binding happens at build time so address conflicts fail the build
//! - Accepting only starts once the server starts the listener
//! - Each listener tags every request with its own identity

pub mod connection;
pub mod factory;
pub mod listener;
pub mod tls;

pub use factory::{ListenerContext, ListenerFactory};
pub use listener::{BoundListener, ListenerError, ListenerId, ServeContext, Transport};
