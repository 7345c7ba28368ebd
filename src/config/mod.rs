//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Config (validated, immutable)
//!     → consumed by server::ServerFactory
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a server rebuild
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    Config, HttpListenerSpec, HttpsListenerSpec, ListenerSpec, LoggingConfig, MetricsConfig,
    ServerConfig,
};
pub use validation::{validate_config, ValidationError};
