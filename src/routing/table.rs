//! Listener-to-handler routing table.
//!
//! # Responsibilities
//! - Hold one entry per bound listener, in insertion order
//! - Resolve a listener identity to its handler in O(1)
//! - Refuse duplicate registrations at build time
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Vec for ordered enumeration, HashMap index for lookup
//! - Explicit lookup error rather than a silent default handler

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;

use crate::net::{BoundListener, ListenerId};
use crate::plane::Plane;
use crate::routing::Handler;

/// Error type for routing table construction and lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// The same listener was registered twice.
    #[error("{listener} ({name}) registered more than once")]
    DuplicateListener { listener: ListenerId, name: String },

    /// No entry for the listener that accepted a request.
    #[error("{0} is not registered in the routing table")]
    UnregisteredListener(ListenerId),
}

/// One listener's route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// Routing key.
    pub listener: ListenerId,
    /// Listener name.
    pub name: String,
    /// Plane of the listener.
    pub plane: Plane,
    /// Bound address.
    pub local_addr: SocketAddr,
    /// Handler serving the listener.
    pub handler: Handler,
}

/// Immutable mapping from listener identity to handler.
#[derive(Debug)]
pub struct RoutingTable {
    entries: Vec<RouteEntry>,
    index: HashMap<ListenerId, usize>,
}

impl RoutingTable {
    /// Build the table from every (listener, handler) pair at once.
    ///
    /// Either every pair is registered or the build fails.
    pub fn build<'a, I>(pairs: I) -> Result<Self, RoutingError>
    where
        I: IntoIterator<Item = (&'a BoundListener, Handler)>,
    {
        let pairs = pairs.into_iter();
        let (lower, _) = pairs.size_hint();
        let mut entries = Vec::with_capacity(lower);
        let mut index = HashMap::with_capacity(lower);

        for (listener, handler) in pairs {
            if index.insert(listener.id(), entries.len()).is_some() {
                return Err(RoutingError::DuplicateListener {
                    listener: listener.id(),
                    name: listener.name().to_owned(),
                });
            }
            entries.push(RouteEntry {
                listener: listener.id(),
                name: listener.name().to_owned(),
                plane: listener.plane(),
                local_addr: listener.local_addr(),
                handler,
            });
        }

        Ok(Self { entries, index })
    }

    /// Look up the route for a listener.
    pub fn route(&self, listener: ListenerId) -> Result<&RouteEntry, RoutingError> {
        self.index
            .get(&listener)
            .map(|&position| &self.entries[position])
            .ok_or(RoutingError::UnregisteredListener(listener))
    }

    /// Whether the listener has an entry.
    pub fn contains(&self, listener: ListenerId) -> bool {
        self.index.contains_key(&listener)
    }

    /// Entries in registration order.
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Entries belonging to one plane, in registration order.
    pub fn plane_entries(&self, plane: Plane) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter().filter(move |entry| entry.plane == plane)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpListenerSpec;
    use crate::net::{ListenerContext, ListenerFactory};
    use crate::pool::ThreadPool;
    use axum::Router;
    use std::sync::Arc;

    fn bind(plane: Plane, pool: &Arc<ThreadPool>) -> BoundListener {
        let spec = HttpListenerSpec {
            bind_host: Some("127.0.0.1".to_string()),
            ..HttpListenerSpec::with_port(0)
        };
        spec.build(&ListenerContext::new(plane, Arc::clone(pool)))
            .unwrap()
    }

    fn handler(name: &str) -> Handler {
        Handler::new(name, Router::new())
    }

    #[test]
    fn every_listener_routes_to_its_handler() {
        let pool = Arc::new(ThreadPool::build(1, 2, "t").unwrap());
        let app = [bind(Plane::Application, &pool), bind(Plane::Application, &pool)];
        let admin = bind(Plane::Admin, &pool);

        let table = RoutingTable::build(
            app.iter()
                .map(|l| (l, handler("app")))
                .chain(std::iter::once((&admin, handler("admin")))),
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        for listener in &app {
            assert_eq!(table.route(listener.id()).unwrap().handler.name(), "app");
        }
        let entry = table.route(admin.id()).unwrap();
        assert_eq!(entry.handler.name(), "admin");
        assert_eq!(entry.plane, Plane::Admin);
        assert_eq!(entry.local_addr, admin.local_addr());
    }

    #[test]
    fn keeps_registration_order() {
        let pool = Arc::new(ThreadPool::build(1, 2, "t").unwrap());
        let listeners = [
            bind(Plane::Admin, &pool),
            bind(Plane::Application, &pool),
            bind(Plane::Admin, &pool),
        ];

        let table = RoutingTable::build(listeners.iter().map(|l| (l, handler("h")))).unwrap();
        let ids: Vec<_> = table.entries().iter().map(|e| e.listener).collect();
        let expected: Vec<_> = listeners.iter().map(BoundListener::id).collect();
        assert_eq!(ids, expected);
        assert_eq!(table.plane_entries(Plane::Admin).count(), 2);
    }

    #[test]
    fn duplicate_registration_fails() {
        let pool = Arc::new(ThreadPool::build(1, 2, "t").unwrap());
        let listener = bind(Plane::Application, &pool);

        let err = RoutingTable::build([(&listener, handler("a")), (&listener, handler("b"))])
            .unwrap_err();
        assert!(matches!(err, RoutingError::DuplicateListener { listener: id, .. } if id == listener.id()));
    }

    #[test]
    fn unknown_listener_is_an_error() {
        let pool = Arc::new(ThreadPool::build(1, 2, "t").unwrap());
        let listener = bind(Plane::Application, &pool);
        let table = RoutingTable::build([(&listener, handler("a"))]).unwrap();

        let stranger = ListenerId::new();
        assert!(!table.contains(stranger));
        assert_eq!(
            table.route(stranger).unwrap_err(),
            RoutingError::UnregisteredListener(stranger)
        );
    }
}
