//! Serving planes.
//!
//! # Data Flow
//! ```text
//! ServerConfig
//!     → Plane::effective_specs (defaults for empty planes)
//!     → assembler.rs (one listener per spec, bound to the plane's pool)
//!     → (listener, handler) pairs
//!     → routing::RoutingTable
//! ```
//!
//! # Design Decisions
//! - Application reuses the server's own pool; Admin always gets a fresh one
//! - Planes are disjoint: a spec is only ever built for the plane listing it
//! - An empty plane gets its default listener unless explicitly allowed empty

pub mod assembler;

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

use crate::config::{ListenerSpec, ServerConfig};

pub use assembler::{assemble, Assembly, Handlers};

/// Name of the dedicated admin pool.
pub const ADMIN_POOL_NAME: &str = "admin";

/// Name of the server's own pool, used by the application plane.
pub const APPLICATION_POOL_NAME: &str = "app";

/// A logically independent serving surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    /// Real traffic.
    Application,
    /// Operational endpoints.
    Admin,
}

impl Plane {
    /// Scope name used to tag metrics and listener names.
    pub fn scope(&self) -> &'static str {
        match self {
            Plane::Application => "application",
            Plane::Admin => "admin",
        }
    }

    /// The listener used when the plane has none configured.
    pub fn default_spec(&self) -> ListenerSpec {
        match self {
            Plane::Application => ListenerSpec::application(),
            Plane::Admin => ListenerSpec::admin(),
        }
    }

    /// The specs configured for this plane.
    pub fn configured_specs<'a>(&self, config: &'a ServerConfig) -> &'a [ListenerSpec] {
        match self {
            Plane::Application => &config.application_listeners,
            Plane::Admin => &config.admin_listeners,
        }
    }

    /// The specs this plane is built from: the configured ones, or the
    /// plane's default listener when none are configured and empty planes
    /// are not allowed.
    pub fn effective_specs<'a>(&self, config: &'a ServerConfig) -> Cow<'a, [ListenerSpec]> {
        let configured = self.configured_specs(config);
        if configured.is_empty() && !config.allow_empty_planes {
            Cow::Owned(vec![self.default_spec()])
        } else {
            Cow::Borrowed(configured)
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scope())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_plane_gets_exactly_one_default() {
        let mut config = ServerConfig::default();
        config.admin_listeners.clear();

        let specs = Plane::Admin.effective_specs(&config);
        assert_eq!(specs.as_ref(), &[ListenerSpec::admin()]);
        assert_eq!(Plane::Application.effective_specs(&config).len(), 1);
    }

    #[test]
    fn empty_plane_kept_when_allowed() {
        let mut config = ServerConfig::default();
        config.allow_empty_planes = true;
        config.admin_listeners.clear();

        assert!(Plane::Admin.effective_specs(&config).is_empty());
    }

    #[test]
    fn configured_specs_are_used_in_order() {
        let mut config = ServerConfig::default();
        config.application_listeners = vec![ListenerSpec::admin(), ListenerSpec::application()];

        let specs = Plane::Application.effective_specs(&config);
        assert_eq!(
            specs.as_ref(),
            &[ListenerSpec::admin(), ListenerSpec::application()]
        );
    }
}
