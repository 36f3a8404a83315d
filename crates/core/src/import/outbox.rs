//! Deferred import document recomputation.
//!
//! Documents that change an import document's inputs do not recompute it
//! inline. They enqueue a task; a [`RecomputeWorker`] claims and runs tasks
//! until the outbox is empty, then idles until woken or until the idle wait
//! expires.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use landed_shared::RecomputeConfig;
use landed_shared::types::RecomputeTaskId;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::error::ImportError;
use super::pipeline::{ImportDocRecomputer, RecomputeOutcome};
use super::ports::ImportDocStore;

/// Queue state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a worker.
    Claimed,
    /// Failed too often; kept for inspection, never claimed again.
    Parked,
}

impl TaskStatus {
    /// Returns the stored label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::Parked => "parked",
        }
    }
}

/// A queued recomputation of one import document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomputeTask {
    /// Task id.
    pub id: RecomputeTaskId,
    /// Import document to recompute.
    pub import_doc: String,
    /// Claims so far, including the current one.
    pub attempts: u32,
    /// When the task was enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// Message of the last failure.
    pub last_error: Option<String>,
}

/// Durable queue of recompute tasks.
#[async_trait]
pub trait RecomputeOutbox: Send + Sync {
    /// Queues a recomputation.
    ///
    /// A document with a task already pending is not queued twice; the id of
    /// the pending task is returned.
    async fn enqueue(&self, import_doc: &str) -> Result<RecomputeTaskId, ImportError>;

    /// Claims the oldest pending task, if any.
    async fn claim(&self) -> Result<Option<RecomputeTask>, ImportError>;

    /// Removes a finished task.
    async fn complete(&self, id: RecomputeTaskId) -> Result<(), ImportError>;

    /// Records a failure. The task goes back to pending, or is parked once
    /// it has been attempted `max_attempts` times. A task going back to
    /// pending is dropped when another pending task covers its document.
    async fn fail(
        &self,
        id: RecomputeTaskId,
        error: &str,
        max_attempts: u32,
    ) -> Result<(), ImportError>;

    /// Waits until a task may be available, at most `timeout`.
    async fn wait(&self, timeout: Duration) {
        tokio::time::sleep(timeout).await;
    }
}

#[derive(Debug)]
struct QueuedTask {
    task: RecomputeTask,
    status: TaskStatus,
}

/// Outbox kept in memory. Enqueues wake a waiting worker immediately.
#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    tasks: Mutex<Vec<QueuedTask>>,
    notify: Notify,
}

impl InMemoryOutbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Vec<QueuedTask>) -> R) -> R {
        f(&mut self.tasks.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of tasks in `status`.
    #[must_use]
    pub fn count(&self, status: TaskStatus) -> usize {
        self.with(|tasks| tasks.iter().filter(|q| q.status == status).count())
    }

    /// Parked tasks.
    #[must_use]
    pub fn parked(&self) -> Vec<RecomputeTask> {
        self.with(|tasks| {
            tasks
                .iter()
                .filter(|q| q.status == TaskStatus::Parked)
                .map(|q| q.task.clone())
                .collect()
        })
    }

    fn missing(id: RecomputeTaskId) -> ImportError {
        ImportError::not_found("RecomputeTask", &id.to_string())
    }
}

#[async_trait]
impl RecomputeOutbox for InMemoryOutbox {
    async fn enqueue(&self, import_doc: &str) -> Result<RecomputeTaskId, ImportError> {
        let id = self.with(|tasks| {
            if let Some(pending) = tasks
                .iter()
                .find(|q| q.status == TaskStatus::Pending && q.task.import_doc == import_doc)
            {
                return pending.task.id;
            }
            let task = RecomputeTask {
                id: RecomputeTaskId::new(),
                import_doc: import_doc.to_string(),
                attempts: 0,
                enqueued_at: Utc::now(),
                last_error: None,
            };
            let id = task.id;
            tasks.push(QueuedTask {
                task,
                status: TaskStatus::Pending,
            });
            id
        });
        self.notify.notify_one();
        Ok(id)
    }

    async fn claim(&self) -> Result<Option<RecomputeTask>, ImportError> {
        Ok(self.with(|tasks| {
            tasks
                .iter_mut()
                .find(|q| q.status == TaskStatus::Pending)
                .map(|q| {
                    q.status = TaskStatus::Claimed;
                    q.task.attempts += 1;
                    q.task.clone()
                })
        }))
    }

    async fn complete(&self, id: RecomputeTaskId) -> Result<(), ImportError> {
        self.with(|tasks| {
            let index = tasks
                .iter()
                .position(|q| q.task.id == id)
                .ok_or_else(|| Self::missing(id))?;
            tasks.remove(index);
            Ok(())
        })
    }

    async fn fail(
        &self,
        id: RecomputeTaskId,
        error: &str,
        max_attempts: u32,
    ) -> Result<(), ImportError> {
        let requeued = self.with(|tasks| {
            let index = tasks
                .iter()
                .position(|q| q.task.id == id)
                .ok_or_else(|| Self::missing(id))?;
            let queued = &mut tasks[index];
            queued.task.last_error = Some(error.to_string());
            if queued.task.attempts >= max_attempts {
                queued.status = TaskStatus::Parked;
                return Ok::<_, ImportError>(false);
            }
            let import_doc = queued.task.import_doc.clone();
            if tasks
                .iter()
                .any(|q| q.status == TaskStatus::Pending && q.task.import_doc == import_doc)
            {
                // A newer pending task already covers the document
                tasks.remove(index);
                return Ok(false);
            }
            tasks[index].status = TaskStatus::Pending;
            Ok(true)
        })?;
        if requeued {
            self.notify.notify_one();
        }
        Ok(())
    }

    async fn wait(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
    }
}

/// Claims outbox tasks and runs them through an [`ImportDocRecomputer`].
pub struct RecomputeWorker<D> {
    outbox: Arc<dyn RecomputeOutbox>,
    recomputer: Arc<ImportDocRecomputer<D>>,
    idle_wait: Duration,
    max_attempts: u32,
}

impl<D: ImportDocStore> RecomputeWorker<D> {
    /// Creates a worker.
    #[must_use]
    pub fn new(
        outbox: Arc<dyn RecomputeOutbox>,
        recomputer: Arc<ImportDocRecomputer<D>>,
        config: &RecomputeConfig,
    ) -> Self {
        Self {
            outbox,
            recomputer,
            idle_wait: Duration::from_millis(config.idle_wait_ms),
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Runs at most one task. Returns false when the outbox was empty.
    ///
    /// A failed recomputation is recorded on the task, not returned. Errors
    /// that cannot succeed on retry park the task at once.
    ///
    /// # Errors
    ///
    /// Returns outbox failures.
    pub async fn run_once(&self) -> Result<bool, ImportError> {
        let Some(task) = self.outbox.claim().await? else {
            return Ok(false);
        };
        let span = tracing::info_span!(
            "recompute_task",
            task_id = %task.id,
            import_doc = %task.import_doc,
            attempt = task.attempts
        );
        self.process(task).instrument(span).await?;
        Ok(true)
    }

    async fn process(&self, task: RecomputeTask) -> Result<(), ImportError> {
        match self.recomputer.recompute(&task.import_doc).await {
            Ok(RecomputeOutcome::Completed(_)) => self.outbox.complete(task.id).await,
            Ok(RecomputeOutcome::Skipped) => {
                tracing::info!("recompute already running elsewhere, task dropped");
                self.outbox.complete(task.id).await
            }
            Err(err) => {
                let limit = if err.is_retryable() {
                    self.max_attempts
                } else {
                    task.attempts
                };
                tracing::error!(error = %err, code = err.error_code(), "recompute failed");
                self.outbox.fail(task.id, &err.to_string(), limit).await
            }
        }
    }

    /// Runs tasks until the outbox has nothing pending. Returns how many
    /// tasks were run.
    ///
    /// # Errors
    ///
    /// Returns outbox failures.
    pub async fn drain(&self) -> Result<usize, ImportError> {
        let mut processed = 0;
        while self.run_once().await? {
            processed += 1;
        }
        Ok(processed)
    }

    /// Runs until `shutdown` is cancelled.
    ///
    /// A task in progress is finished before the worker stops.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("recompute worker started");
        while !shutdown.is_cancelled() {
            let idle = match self.run_once().await {
                Ok(ran) => !ran,
                Err(err) => {
                    tracing::error!(error = %err, "recompute outbox unavailable");
                    true
                }
            };
            if idle {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = self.outbox.wait(self.idle_wait) => {}
                }
            }
        }
        tracing::info!("recompute worker stopped");
    }
}
