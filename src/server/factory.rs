//! Builds a [`Server`] from configuration and plane handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::validation::validate_server;
use crate::config::ServerConfig;
use crate::plane::{assemble, Handlers, APPLICATION_POOL_NAME};
use crate::pool::ThreadPool;
use crate::server::{BuildError, Server};

/// Server factory with separate application and admin planes.
///
/// Every plane may have any number of listeners, each on its own address.
/// Admin listeners get their own pool so control-plane requests stay
/// serviceable when the application plane is saturated.
#[derive(Debug, Clone)]
pub struct ServerFactory {
    config: ServerConfig,
}

impl ServerFactory {
    /// Create a factory for `config`.
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// The configuration this factory builds from.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Validate configuration, bind every listener and wire the routing
    /// table. Nothing is started.
    pub fn build(&self, handlers: Handlers) -> Result<Server, BuildError> {
        let errors = validate_server(&self.config);
        if !errors.is_empty() {
            return Err(BuildError::Config(errors));
        }

        let main_pool = Arc::new(ThreadPool::build(
            self.config.min_threads,
            self.config.max_threads,
            APPLICATION_POOL_NAME,
        )?);

        let assembly = assemble(&self.config, &main_pool, &handlers)?;
        let (listeners, admin_pool, routing) = assembly.into_listeners();

        tracing::info!(
            listeners = listeners.len(),
            routes = routing.len(),
            "Server built"
        );

        Ok(Server::new(
            main_pool,
            vec![admin_pool],
            listeners,
            routing,
            Duration::from_secs(self.config.shutdown_grace_period_secs),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpListenerSpec, ListenerSpec};
    use crate::plane::Plane;
    use crate::routing::Handler;
    use crate::server::ServerState;
    use axum::Router;

    fn loopback() -> ListenerSpec {
        ListenerSpec::Http(HttpListenerSpec {
            bind_host: Some("127.0.0.1".to_string()),
            ..HttpListenerSpec::with_port(0)
        })
    }

    fn handlers() -> Handlers {
        Handlers {
            application: Handler::new("application", Router::new()),
            admin: Handler::new("admin", Router::new()),
        }
    }

    #[test]
    fn builds_without_starting() {
        let config = ServerConfig {
            application_listeners: vec![loopback(), loopback()],
            admin_listeners: vec![loopback()],
            ..ServerConfig::default()
        };

        let server = ServerFactory::new(config).build(handlers()).unwrap();
        assert_eq!(server.state(), ServerState::Built);
        assert_eq!(server.listeners().len(), 3);
        assert_eq!(server.routing_table().len(), 3);
        assert_eq!(server.managed_pools().len(), 1);
        assert_eq!(
            server
                .listeners()
                .iter()
                .filter(|l| l.plane() == Plane::Admin)
                .count(),
            1
        );
        assert!(server.listeners().iter().all(|l| !l.is_started()));
    }

    #[test]
    fn invalid_sizing_fails_before_any_pool() {
        let config = ServerConfig {
            application_listeners: vec![loopback()],
            admin_listeners: vec![loopback()],
            admin_min_threads: 3,
            admin_max_threads: 2,
            ..ServerConfig::default()
        };

        let err = ServerFactory::new(config).build(handlers()).unwrap_err();
        match err {
            BuildError::Config(errors) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }
}
