//! Plane assembly.
//!
//! # Responsibilities
//! - Build each plane's listeners, in spec order, against the plane's pool
//! - Build the dedicated admin pool
//! - Pair every listener with its plane's handler and build the routing table
//!
//! # Design Decisions
//! - Pools are passed in explicitly; nothing reaches into server state
//! - Any failure aborts the whole assembly; bound sockets are dropped

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::net::{BoundListener, ListenerContext, ListenerFactory};
use crate::plane::{Plane, ADMIN_POOL_NAME};
use crate::pool::ThreadPool;
use crate::routing::{Handler, RoutingTable};
use crate::server::BuildError;

/// The two plane handlers, supplied fully formed.
#[derive(Debug, Clone)]
pub struct Handlers {
    /// Serves every application listener.
    pub application: Handler,
    /// Serves every admin listener.
    pub admin: Handler,
}

impl Handlers {
    /// The handler owned by `plane`.
    pub fn for_plane(&self, plane: Plane) -> &Handler {
        match plane {
            Plane::Application => &self.application,
            Plane::Admin => &self.admin,
        }
    }
}

/// Output of [`assemble`].
#[derive(Debug)]
pub struct Assembly {
    /// Application listeners, in spec order, on the main pool.
    pub application: Vec<BoundListener>,
    /// Admin listeners, in spec order, on `admin_pool`.
    pub admin: Vec<BoundListener>,
    /// The dedicated admin pool, to be registered with the lifecycle host.
    pub admin_pool: Arc<ThreadPool>,
    /// Routes for every listener above.
    pub routing: RoutingTable,
}

impl Assembly {
    /// All listeners, application first.
    pub fn into_listeners(self) -> (Vec<BoundListener>, Arc<ThreadPool>, RoutingTable) {
        let mut listeners = self.application;
        listeners.extend(self.admin);
        (listeners, self.admin_pool, self.routing)
    }
}

/// Build both planes and their routing table.
pub fn assemble(
    config: &ServerConfig,
    main_pool: &Arc<ThreadPool>,
    handlers: &Handlers,
) -> Result<Assembly, BuildError> {
    let application = build_plane(Plane::Application, config, main_pool)?;

    let admin_pool = Arc::new(ThreadPool::build(
        config.admin_min_threads,
        config.admin_max_threads,
        ADMIN_POOL_NAME,
    )?);
    let admin = build_plane(Plane::Admin, config, &admin_pool)?;

    if application.is_empty() && admin.is_empty() {
        return Err(BuildError::NoReachablePlane);
    }

    let routing = RoutingTable::build(
        application
            .iter()
            .map(|listener| (listener, handlers.application.clone()))
            .chain(
                admin
                    .iter()
                    .map(|listener| (listener, handlers.admin.clone())),
            ),
    )?;

    tracing::debug!(
        application = application.len(),
        admin = admin.len(),
        routes = routing.len(),
        "Planes assembled"
    );

    Ok(Assembly {
        application,
        admin,
        admin_pool,
        routing,
    })
}

fn build_plane(
    plane: Plane,
    config: &ServerConfig,
    pool: &Arc<ThreadPool>,
) -> Result<Vec<BoundListener>, BuildError> {
    let specs = plane.effective_specs(config);
    if plane.configured_specs(config).is_empty() {
        if specs.is_empty() {
            tracing::warn!(plane = %plane, "Plane has no listeners and is unreachable");
        } else {
            tracing::info!(plane = %plane, "No listeners configured, using the default listener");
        }
    }

    let ctx = ListenerContext::new(plane, Arc::clone(pool));
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            spec.build(&ctx).map_err(|source| BuildError::Listener {
                plane,
                index,
                source,
            })
        })
        .collect()
}
