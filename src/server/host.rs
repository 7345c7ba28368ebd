//! The lifecycle host owning pools, listeners and the dispatcher.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::lifecycle::{signals, Shutdown};
use crate::net::connection::ConnectionTracker;
use crate::net::{BoundListener, ServeContext};
use crate::pool::ThreadPool;
use crate::routing::{Dispatcher, RoutingTable};
use crate::server::{ServerError, ServerResult};

/// How long a pool gets to finish stray tasks once draining is over.
const POOL_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Server lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Built, nothing running.
    Built,
    /// Pools running, listeners accepting.
    Running,
    /// Tearing down.
    Stopping,
    /// Torn down. Terminal.
    Stopped,
}

/// A built server: both planes' listeners, their pools and the routing table.
pub struct Server {
    main_pool: Arc<ThreadPool>,
    managed_pools: Vec<Arc<ThreadPool>>,
    listeners: Vec<BoundListener>,
    dispatcher: Dispatcher,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
    stop_tx: watch::Sender<bool>,
    drain_tx: watch::Sender<bool>,
    serve: ServeContext,
    accept_loops: Mutex<Vec<(Arc<ThreadPool>, JoinHandle<()>)>>,
    state: Mutex<ServerState>,
    grace_period: Duration,
}

impl Server {
    pub(crate) fn new(
        main_pool: Arc<ThreadPool>,
        managed_pools: Vec<Arc<ThreadPool>>,
        listeners: Vec<BoundListener>,
        routing: RoutingTable,
        grace_period: Duration,
    ) -> Self {
        let shutdown = Shutdown::new();
        let dispatcher = Dispatcher::new(Arc::new(routing), shutdown.clone());
        let tracker = ConnectionTracker::new();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (drain_tx, drain_rx) = watch::channel(false);

        let serve = ServeContext {
            dispatcher: dispatcher.clone(),
            tracker: tracker.clone(),
            stop: stop_rx,
            drain: drain_rx,
        };

        Self {
            main_pool,
            managed_pools,
            listeners,
            dispatcher,
            tracker,
            shutdown,
            stop_tx,
            drain_tx,
            serve,
            accept_loops: Mutex::new(Vec::new()),
            state: Mutex::new(ServerState::Built),
            grace_period,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.lock_state()
    }

    /// Every listener, application plane first, in spec order.
    pub fn listeners(&self) -> &[BoundListener] {
        &self.listeners
    }

    /// The routing table behind the dispatcher.
    pub fn routing_table(&self) -> &RoutingTable {
        self.dispatcher.table()
    }

    /// The composite handler every listener dispatches through.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The server's own pool, used by the application plane.
    pub fn main_pool(&self) -> &Arc<ThreadPool> {
        &self.main_pool
    }

    /// Pools registered with the server's lifecycle besides the main pool.
    pub fn managed_pools(&self) -> &[Arc<ThreadPool>] {
        &self.managed_pools
    }

    /// Open connections across both planes.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Latch that asks the server to shut down.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Start pools, then listeners. On failure everything started so far is
    /// torn down and the server ends up `Stopped`.
    pub fn start(&self) -> ServerResult<()> {
        {
            let mut state = self.lock_state();
            if *state != ServerState::Built {
                return Err(ServerError::InvalidState(*state));
            }
            *state = ServerState::Running;
        }

        if let Err(e) = self.start_components() {
            tracing::error!(error = %e, "Server failed to start");
            self.set_state(ServerState::Stopping);
            self.teardown();
            self.set_state(ServerState::Stopped);
            return Err(e);
        }

        for entry in self.routing_table().entries() {
            tracing::info!(
                listener = %entry.name,
                plane = %entry.plane,
                address = %entry.local_addr,
                handler = entry.handler.name(),
                "Route registered"
            );
        }
        tracing::info!(listeners = self.listeners.len(), "Server started");
        Ok(())
    }

    fn start_components(&self) -> ServerResult<()> {
        self.main_pool.start()?;
        for pool in &self.managed_pools {
            pool.start()?;
        }

        for listener in &self.listeners {
            let accept_loop = listener.start(self.serve.clone())?;
            self.lock_accept_loops()
                .push((Arc::clone(listener.pool()), accept_loop));
        }
        Ok(())
    }

    /// Stop accepting, drain, then stop the application pool and finally
    /// the managed (admin) pools. Idempotent; blocks until done.
    ///
    /// Called from inside an async context it only signals listeners and
    /// connections and shuts the pools down in the background.
    pub fn stop(&self) {
        {
            let mut state = self.lock_state();
            match *state {
                ServerState::Stopping | ServerState::Stopped => return,
                ServerState::Built | ServerState::Running => *state = ServerState::Stopping,
            }
        }

        tracing::info!("Server stopping");
        self.shutdown.trigger();
        self.teardown();
        self.set_state(ServerState::Stopped);
        tracing::info!("Server stopped");
    }

    /// Block until a termination signal or a shutdown trigger, then stop.
    pub fn run_until_shutdown(&self) -> ServerResult<()> {
        let shutdown = self.shutdown.clone();
        self.main_pool.block_on(async move {
            tokio::select! {
                _ = signals::shutdown_signal() => {}
                _ = shutdown.wait() => {
                    tracing::warn!("Shutdown requested");
                }
            }
        })?;
        self.stop();
        Ok(())
    }

    fn teardown(&self) {
        // 1. No new accepts, and open connections stop taking new requests.
        self.stop_tx.send_replace(true);
        self.drain_tx.send_replace(true);
        let accept_loops = std::mem::take(&mut *self.lock_accept_loops());

        if Handle::try_current().is_ok() {
            tracing::warn!(
                accept_loops = accept_loops.len(),
                "Stopping from inside an async context, not waiting for listeners or connections"
            );
        } else {
            for (pool, accept_loop) in accept_loops {
                match pool.block_on(accept_loop) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(error = %e, "Accept loop ended abnormally"),
                    Err(e) => tracing::warn!(error = %e, "Accept loop could not be joined"),
                }
            }

            // 2. Let in-flight requests finish.
            let tracker = self.tracker.clone();
            let grace_period = self.grace_period;
            let drained = self.main_pool.block_on(async move {
                tokio::time::timeout(grace_period, tracker.wait_until_idle()).await
            });
            if let Ok(Err(_)) = drained {
                tracing::warn!(
                    remaining = self.tracker.active_count(),
                    grace_period = ?self.grace_period,
                    "Grace period elapsed with connections still open"
                );
            }
        }

        // 3. Application pool, then managed pools.
        self.main_pool.stop(POOL_STOP_TIMEOUT);
        for pool in &self.managed_pools {
            pool.stop(POOL_STOP_TIMEOUT);
        }
    }

    fn set_state(&self, state: ServerState) {
        *self.lock_state() = state;
    }

    fn lock_state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().expect("server state mutex poisoned")
    }

    fn lock_accept_loops(&self) -> MutexGuard<'_, Vec<(Arc<ThreadPool>, JoinHandle<()>)>> {
        self.accept_loops
            .lock()
            .expect("accept loop registry mutex poisoned")
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.state() == ServerState::Running {
            self.stop();
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("state", &self.state())
            .field("main_pool", &self.main_pool)
            .field("managed_pools", &self.managed_pools)
            .field("listeners", &self.listeners)
            .finish()
    }
}
