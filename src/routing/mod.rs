//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Server build:
//!     (BoundListener, Handler) pairs from both planes
//!     → table.rs (one immutable RoutingTable, insertion ordered)
//!     → dispatch.rs (Dispatcher: the single composite handler)
//!
//! Every request:
//!     listener tags request with its ListenerId
//!     → Dispatcher::dispatch (O(1) lookup by ListenerId)
//!     → plane Handler
//! ```
//!
//! # Design Decisions
//! - Built once, immutable at runtime: lookups take no locks
//! - Two-phase construction: collect all pairs, then build the table
//! - A lookup miss is a wiring defect, not a request error: it is fatal

pub mod dispatch;
pub mod handler;
pub mod table;

pub use dispatch::{DispatchError, Dispatcher};
pub use handler::Handler;
pub use table::{RouteEntry, RoutingError, RoutingTable};
