//! Bounded, named worker pool backed by a dedicated tokio runtime.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::validation::check_pool_size;

/// Error type for pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Sizing rejected before construction.
    #[error("invalid size for pool '{name}': {reason}")]
    InvalidSize { name: String, reason: String },

    /// The runtime could not be created.
    #[error("failed to start pool '{name}': {source}")]
    Runtime {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// `start` called twice.
    #[error("pool '{0}' is already running")]
    AlreadyStarted(String),

    /// The pool has not been started, or has been stopped.
    #[error("pool '{0}' is not running")]
    NotRunning(String),

    /// The pool stopped accepting work.
    #[error("pool '{0}' no longer accepts work")]
    Closed(String),
}

/// Observable lifecycle state of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Built, no threads.
    Idle,
    /// Threads running, accepting work.
    Running,
    /// Shut down. Terminal.
    Stopped,
}

enum Inner {
    Idle,
    Running(Runtime),
    Stopped,
}

/// A bounded worker pool.
///
/// `min_threads` worker threads drive the pool's tasks; `max_threads` caps
/// both the blocking threads the runtime may grow to and the number of
/// units of work executing at once. Threads are named `"<name>-<n>"`.
pub struct ThreadPool {
    name: String,
    min_threads: usize,
    max_threads: usize,
    work: Arc<Semaphore>,
    inner: Mutex<Inner>,
}

impl ThreadPool {
    /// Validate sizing and construct an idle pool. No threads are started.
    pub fn build(
        min_threads: usize,
        max_threads: usize,
        name: impl Into<String>,
    ) -> Result<Self, PoolError> {
        let name = name.into();
        check_pool_size(min_threads, max_threads)
            .map_err(|reason| PoolError::InvalidSize {
                name: name.clone(),
                reason,
            })?;

        tracing::debug!(pool = %name, min_threads, max_threads, "Pool built");

        Ok(Self {
            name,
            min_threads,
            max_threads,
            work: Arc::new(Semaphore::new(max_threads)),
            inner: Mutex::new(Inner::Idle),
        })
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Core worker threads.
    pub fn min_threads(&self) -> usize {
        self.min_threads
    }

    /// Thread and concurrency cap.
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PoolState {
        match *self.lock() {
            Inner::Idle => PoolState::Idle,
            Inner::Running(_) => PoolState::Running,
            Inner::Stopped => PoolState::Stopped,
        }
    }

    /// Start the pool's threads.
    pub fn start(&self) -> Result<(), PoolError> {
        let mut inner = self.lock();
        match *inner {
            Inner::Running(_) => return Err(PoolError::AlreadyStarted(self.name.clone())),
            Inner::Stopped => return Err(PoolError::NotRunning(self.name.clone())),
            Inner::Idle => {}
        }

        let prefix = self.name.clone();
        let counter = AtomicUsize::new(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(self.min_threads)
            .max_blocking_threads(self.max_threads)
            .thread_name_fn(move || {
                format!("{}-{}", prefix, counter.fetch_add(1, Ordering::Relaxed))
            })
            .enable_all()
            .build()
            .map_err(|source| PoolError::Runtime {
                name: self.name.clone(),
                source,
            })?;

        *inner = Inner::Running(runtime);
        drop(inner);

        crate::observability::metrics::record_pool_started(
            &self.name,
            self.min_threads,
            self.max_threads,
        );
        tracing::info!(
            pool = %self.name,
            min_threads = self.min_threads,
            max_threads = self.max_threads,
            "Pool started"
        );
        Ok(())
    }

    /// Handle for spawning onto the pool.
    pub fn handle(&self) -> Result<Handle, PoolError> {
        match &*self.lock() {
            Inner::Running(runtime) => Ok(runtime.handle().clone()),
            _ => Err(PoolError::NotRunning(self.name.clone())),
        }
    }

    /// Drive a future to completion on the calling thread, with the pool's
    /// runtime as context. Must not be called from inside a runtime.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output, PoolError> {
        let handle = self.handle()?;
        Ok(handle.block_on(future))
    }

    /// Wait for a work slot. Fails once the pool is stopping.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, PoolError> {
        self.work
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed(self.name.clone()))
    }

    /// Free work slots right now.
    pub fn available_permits(&self) -> usize {
        self.work.available_permits()
    }

    /// Stop accepting work and shut the runtime down, waiting at most
    /// `timeout` for running tasks. Idempotent. From inside an async context
    /// the runtime is shut down without waiting.
    pub fn stop(&self, timeout: Duration) {
        self.work.close();

        let previous = std::mem::replace(&mut *self.lock(), Inner::Stopped);
        if let Inner::Running(runtime) = previous {
            // A runtime cannot be waited on from async context.
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(timeout);
            }
            tracing::info!(pool = %self.name, "Pool stopped");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("thread pool state mutex poisoned")
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.name)
            .field("min_threads", &self.min_threads)
            .field("max_threads", &self.max_threads)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_sizing() {
        assert!(matches!(
            ThreadPool::build(4, 2, "p"),
            Err(PoolError::InvalidSize { .. })
        ));
        assert!(matches!(
            ThreadPool::build(1, 1, "p"),
            Err(PoolError::InvalidSize { .. })
        ));
        assert!(matches!(
            ThreadPool::build(0, 4, "p"),
            Err(PoolError::InvalidSize { .. })
        ));
    }

    #[test]
    fn build_does_not_start() {
        let pool = ThreadPool::build(1, 2, "idle").unwrap();
        assert_eq!(pool.state(), PoolState::Idle);
        assert!(matches!(pool.handle(), Err(PoolError::NotRunning(_))));
    }

    #[test]
    fn runs_work_on_named_threads() {
        let pool = ThreadPool::build(2, 4, "worker").unwrap();
        pool.start().unwrap();
        assert_eq!(pool.state(), PoolState::Running);
        assert!(matches!(pool.start(), Err(PoolError::AlreadyStarted(_))));

        let handle = pool.handle().unwrap();
        let name = pool
            .block_on(async move {
                handle
                    .spawn(async { std::thread::current().name().map(str::to_owned) })
                    .await
            })
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(name.starts_with("worker-"), "thread name was {name}");

        pool.stop(Duration::from_secs(1));
    }

    #[test]
    fn permits_bound_concurrent_work() {
        let pool = Arc::new(ThreadPool::build(1, 2, "bounded").unwrap());
        pool.start().unwrap();

        let p = pool.clone();
        pool.block_on(async move {
            let first = p.acquire().await.unwrap();
            let _second = p.acquire().await.unwrap();
            assert_eq!(p.available_permits(), 0);
            drop(first);
            assert_eq!(p.available_permits(), 1);
        })
        .unwrap();

        pool.stop(Duration::from_secs(1));
    }

    #[test]
    fn stopped_pool_refuses_work() {
        let pool = Arc::new(ThreadPool::build(1, 2, "stopped").unwrap());
        pool.start().unwrap();
        pool.stop(Duration::from_secs(1));
        pool.stop(Duration::from_secs(1));

        assert_eq!(pool.state(), PoolState::Stopped);
        assert!(matches!(pool.start(), Err(PoolError::NotRunning(_))));

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let result = rt.block_on(pool.acquire());
        assert!(matches!(result, Err(PoolError::Closed(_))));
    }

    #[tokio::test]
    async fn stops_from_async_context() {
        let pool = ThreadPool::build(1, 2, "nested").unwrap();
        pool.start().unwrap();
        pool.handle().unwrap().spawn(std::future::pending::<()>());

        pool.stop(Duration::from_secs(1));
        assert_eq!(pool.state(), PoolState::Stopped);
        assert!(pool.acquire().await.is_err());
    }
}
