//! Task management for tally nodes.
//!
//! A [`TaskManager`] owns the lifecycle of everything a node spawns: the HTTP
//! server, the merge pipeline, the farm and the metronome. Tasks are spawned
//! through a cloneable [`TaskExecutor`]. Critical tasks report panics back to
//! the manager, which resolves as a future once a critical task fails.
//!
//! ```ignore
//! let manager = TaskManager::current();
//! let executor = manager.executor();
//!
//! executor.spawn_critical("http", async move { server.run().await });
//!
//! if let Err(err) = manager.await {
//!     tracing::error!(%err, "critical task failed");
//! }
//! ```

mod metrics;
mod metronome;

pub use metronome::{Metronome, MetronomeBuilder, RoutineStatus};

use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::FutureExt;
use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, error};
use tracing_futures::Instrument;

use crate::metrics::{IncCounterOnDrop, TaskExecutorMetrics};

/// A critical task panicked.
#[derive(Debug, Clone, thiserror::Error)]
#[error("critical task `{task_name}` panicked: `{error:?}`")]
pub struct PanickedTaskError {
    task_name: &'static str,
    error: Option<String>,
}

impl PanickedTaskError {
    fn new(task_name: &'static str, error: Box<dyn Any + Send>) -> Self {
        let error = match error.downcast::<String>() {
            Ok(value) => Some(*value),
            Err(error) => match error.downcast::<&str>() {
                Ok(value) => Some(value.to_string()),
                Err(_) => None,
            },
        };

        Self { task_name, error }
    }

    /// Name of the task that panicked.
    pub fn task_name(&self) -> &'static str {
        self.task_name
    }
}

/// Owns spawned tasks and resolves when a critical task panics.
#[derive(Debug)]
pub struct TaskManager {
    handle: Handle,
    panicked_tasks_tx: mpsc::UnboundedSender<PanickedTaskError>,
    panicked_tasks_rx: mpsc::UnboundedReceiver<PanickedTaskError>,
    shutdown_tx: watch::Sender<bool>,
}

impl TaskManager {
    /// Create a task manager on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    pub fn new(handle: Handle) -> Self {
        let (panicked_tasks_tx, panicked_tasks_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            handle,
            panicked_tasks_tx,
            panicked_tasks_rx,
            shutdown_tx,
        }
    }

    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor {
            handle: self.handle.clone(),
            shutdown: self.shutdown_tx.subscribe(),
            panicked_tasks_tx: self.panicked_tasks_tx.clone(),
            metrics: TaskExecutorMetrics::default(),
        }
    }

    /// Signal every spawned task to stop.
    pub fn graceful_shutdown(&self) {
        debug!("signalling task shutdown");
        let _ = self.shutdown_tx.send(true);
    }
}

impl Future for TaskManager {
    type Output = Result<(), PanickedTaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut().panicked_tasks_rx.poll_recv(cx) {
            Poll::Ready(Some(err)) => Poll::Ready(Err(err)),
            Poll::Ready(None) => Poll::Ready(Ok(())),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Shutdown signal handed to long-running loops.
#[derive(Debug, Clone)]
pub struct Shutdown(watch::Receiver<bool>);

impl Shutdown {
    /// Whether shutdown was requested. Cheap enough to poll from blocking loops.
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown is requested. Never resolves if the manager is
    /// dropped without signalling.
    pub async fn wait(mut self) {
        if self.0.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Cloneable handle for spawning tasks tied to a [`TaskManager`].
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    handle: Handle,
    shutdown: watch::Receiver<bool>,
    panicked_tasks_tx: mpsc::UnboundedSender<PanickedTaskError>,
    metrics: TaskExecutorMetrics,
}

impl TaskExecutor {
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn on_shutdown(&self) -> Shutdown {
        Shutdown(self.shutdown.clone())
    }

    /// Spawn a task that is cancelled on shutdown.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.metrics.inc_regular_tasks();
        let finished = IncCounterOnDrop::new(self.metrics.finished_regular_tasks_total.clone());
        let shutdown = self.on_shutdown();

        let task = async move {
            let _finished = finished;
            tokio::select! {
                _ = fut => {}
                _ = shutdown.wait() => {}
            }
        }
        .in_current_span();

        self.handle.spawn(task)
    }

    /// Spawn a task whose panic resolves the [`TaskManager`] with an error.
    pub fn spawn_critical<F>(&self, name: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.metrics.inc_critical_tasks();
        let finished = IncCounterOnDrop::new(self.metrics.finished_critical_tasks_total.clone());
        let panicked_tasks_tx = self.panicked_tasks_tx.clone();
        let shutdown = self.on_shutdown();

        let task = AssertUnwindSafe(fut).catch_unwind().map(move |result| {
            if let Err(error) = result {
                let task_error = PanickedTaskError::new(name, error);
                error!("{task_error}");
                let _ = panicked_tasks_tx.send(task_error);
            }
        });

        let task = async move {
            let _finished = finished;
            tokio::select! {
                _ = task => {}
                _ = shutdown.wait() => {
                    debug!(task = name, "critical task stopped on shutdown");
                }
            }
        }
        .in_current_span();

        self.handle.spawn(task)
    }

    /// Run a blocking closure on the blocking pool, reporting panics like a
    /// critical task. The closure is expected to poll [`Shutdown`] itself.
    pub fn spawn_critical_blocking<F>(&self, name: &'static str, f: F) -> JoinHandle<()>
    where
        F: FnOnce(Shutdown) + Send + 'static,
    {
        self.metrics.inc_blocking_tasks();
        let finished = IncCounterOnDrop::new(self.metrics.finished_blocking_tasks_total.clone());
        let panicked_tasks_tx = self.panicked_tasks_tx.clone();
        let shutdown = self.on_shutdown();

        self.handle.spawn_blocking(move || {
            let _finished = finished;
            if let Err(error) = std::panic::catch_unwind(AssertUnwindSafe(|| f(shutdown))) {
                let task_error = PanickedTaskError::new(name, error);
                error!("{task_error}");
                let _ = panicked_tasks_tx.send(task_error);
            }
        })
    }
}
