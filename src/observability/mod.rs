//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges via the metrics facade)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → admin plane GET /metrics (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every listener's metrics carry its plane scope and listener name
//! - Thread names are logged so plane pools can be told apart
//! - Without an installed recorder, metric updates are no-ops

pub mod logging;
pub mod metrics;
