//! Explicit execution context for capability work.

use std::any::Any;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};

/// Concurrency settings for an [`Executor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorConfig {
    max_concurrency: Option<NonZeroUsize>,
}

impl ExecutorConfig {
    /// No limit on concurrently running work.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_concurrency: None,
        }
    }

    /// At most `max_concurrency` units of work run at once.
    #[must_use]
    pub const fn bounded(max_concurrency: NonZeroUsize) -> Self {
        Self {
            max_concurrency: Some(max_concurrency),
        }
    }

    /// Returns the configured concurrency limit, if any.
    #[must_use]
    pub const fn max_concurrency(self) -> Option<NonZeroUsize> {
        self.max_concurrency
    }
}

/// Handle to the runtime that executes capability bodies.
///
/// Cloning is cheap; clones share the concurrency limit and the closed flag.
#[derive(Debug, Clone)]
pub struct Executor {
    handle: Handle,
    semaphore: Option<Arc<Semaphore>>,
    closed: Arc<AtomicBool>,
    config: ExecutorConfig,
}

impl Executor {
    /// Creates an executor that schedules onto `handle`.
    #[must_use]
    pub fn new(handle: Handle, config: ExecutorConfig) -> Self {
        let semaphore = config
            .max_concurrency()
            .map(|limit| Arc::new(Semaphore::new(limit.get())));
        Self {
            handle,
            semaphore,
            closed: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Creates an unbounded executor on the runtime the caller runs in.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::NoRuntime`] outside a tokio runtime.
    pub fn current() -> ExecutorResult<Self> {
        let handle = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;
        Ok(Self::new(handle, ExecutorConfig::unbounded()))
    }

    /// Returns the runtime handle.
    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Returns the associated configuration.
    #[must_use]
    pub const fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Returns `true` once [`close`](Self::close) has been called on any clone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Rejects further work. In-flight work is not interrupted.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(semaphore) = &self.semaphore {
            semaphore.close();
        }
    }

    /// Spawns a future, respecting the configured concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Closed`] when the executor is closed. The task
    /// itself resolves to [`ExecutorError::Closed`] if the executor closes
    /// while it waits for a permit.
    pub fn spawn<F, T>(&self, future: F) -> ExecutorResult<JoinHandle<ExecutorResult<T>>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_closed() {
            return Err(ExecutorError::Closed);
        }

        let semaphore = self.semaphore.clone();
        Ok(self.handle.spawn(async move {
            let _permit = match semaphore {
                Some(semaphore) => Some(
                    semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| ExecutorError::Closed)?,
                ),
                None => None,
            };
            Ok(future.await)
        }))
    }

    /// Runs `future` on the executor and waits for its output.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Closed`] when the executor is closed, or
    /// [`ExecutorError::Panicked`] / [`ExecutorError::Cancelled`] when the task
    /// did not complete.
    pub async fn run<F, T>(&self, future: F) -> ExecutorResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let task = self.spawn(future)?;
        task.await.map_err(ExecutorError::from_join)?
    }

    /// Runs blocking work on the runtime's blocking pool.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn run_blocking<F, T>(&self, work: F) -> ExecutorResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_closed() {
            return Err(ExecutorError::Closed);
        }

        let _permit = match &self.semaphore {
            Some(semaphore) => Some(
                Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| ExecutorError::Closed)?,
            ),
            None => None,
        };

        self.handle
            .spawn_blocking(work)
            .await
            .map_err(ExecutorError::from_join)
    }

    /// Runs `future` on the executor and blocks the calling thread until it
    /// completes.
    ///
    /// Callable from plain threads and from multi-threaded runtime workers.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::CurrentThreadRuntime`] when called from a
    /// current-thread runtime, where waiting would deadlock; otherwise the
    /// same errors as [`run`](Self::run).
    pub fn block_on<F, T>(&self, future: F) -> ExecutorResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let inside_runtime = match Handle::try_current() {
            Ok(current) if current.runtime_flavor() == RuntimeFlavor::CurrentThread => {
                return Err(ExecutorError::CurrentThreadRuntime);
            }
            Ok(_) => true,
            Err(_) => false,
        };

        let task = self.spawn(future)?;
        let joined = if inside_runtime {
            tokio::task::block_in_place(|| futures::executor::block_on(task))
        } else {
            futures::executor::block_on(task)
        };
        joined.map_err(ExecutorError::from_join)?
    }
}

/// Errors produced by the executor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// Executor is closed and will not accept new work.
    #[error("executor closed")]
    Closed,
    /// No tokio runtime is available on this thread.
    #[error("no tokio runtime available")]
    NoRuntime,
    /// A blocking wait was requested on a current-thread runtime.
    #[error("cannot block inside a current-thread runtime")]
    CurrentThreadRuntime,
    /// The task panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task was cancelled before completing.
    #[error("task cancelled")]
    Cancelled,
}

impl ExecutorError {
    fn from_join(err: JoinError) -> Self {
        if err.is_panic() {
            Self::Panicked(panic_message(&*err.into_panic()))
        } else {
            Self::Cancelled
        }
    }
}

/// Result alias for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Extracts the message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
