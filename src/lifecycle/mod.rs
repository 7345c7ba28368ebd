//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (server::Server::start):
//!     Start pools (application, then managed) → Start listeners
//!
//! Shutdown (server::Server::stop):
//!     Trigger received → Stop accepting → Drain connections
//!     → Stop application pool → Stop managed pools (admin)
//!
//! Triggers (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!     Routing invariant violation → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - Listeners start last and stop first
//! - The admin pool outlives the application pool during shutdown
//! - Drain has a grace period: stragglers are cut off with the pool

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
