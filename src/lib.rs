//! Split-plane HTTP server library
//!
//! One server process, two serving planes: the application plane carries
//! real traffic on the server's own pool, the admin plane carries
//! operational endpoints on a dedicated pool so it stays reachable when the
//! application plane is saturated.

pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod plane;
pub mod pool;
pub mod routing;
pub mod server;

pub use config::Config;
pub use lifecycle::Shutdown;
pub use plane::{Handlers, Plane};
pub use routing::Handler;
pub use server::{Server, ServerFactory};
