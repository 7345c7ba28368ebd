//! Worker pools.
//!
//! # Data Flow
//! ```text
//! ThreadPool::build (validate sizing, no threads yet)
//!     → Server::start → ThreadPool::start (dedicated tokio runtime)
//!     → listeners spawn accept loops / connections onto the pool
//!     → dispatch acquires a work permit per unit of work
//!     → Server::stop → ThreadPool::stop (close permits, shut runtime down)
//! ```
//!
//! # Design Decisions
//! - One runtime per pool: planes never share worker threads
//! - Construction is cheap and side-effect free; start is explicit
//! - `max_threads` bounds concurrently executing units of work

pub mod thread_pool;

pub use thread_pool::{PoolError, PoolState, ThreadPool};
