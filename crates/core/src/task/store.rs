//! Task storage trait and error types.

use async_trait::async_trait;
use thiserror::Error;

use super::{DownloadResult, Task, TaskStatus};

/// Error type for task store operations.
#[derive(Debug, Error)]
pub enum TaskStoreError {
    /// Task not found.
    #[error("task not found: {0}")]
    NotFound(String),

    /// A task with this id already exists.
    #[error("duplicate task id: {0}")]
    DuplicateId(String),

    /// The requested status change is not allowed by the state machine.
    #[error("transition rejected for task {id}: {from} -> {to}")]
    TransitionRejected {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// Durable write exhausted its retry budget.
    ///
    /// The in-memory state has already advanced; only durability is in
    /// question.
    #[error("failed to persist task file: {0}")]
    PersistenceFailed(String),

    /// Task record could not be encoded or decoded.
    #[error("task serialization error: {0}")]
    Serialization(String),

    /// I/O error while opening or reading the task file.
    #[error("task file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fields to merge into a task alongside a status change.
///
/// `result` is replaced only when provided. `error` always replaces the
/// stored value: failure paths pass the message, the retry path passes
/// `None` to clear it.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    /// New produced-artifact record, if any.
    pub result: Option<DownloadResult>,
    /// New terminal failure message; `None` clears the stored one.
    pub error: Option<String>,
}

impl StatusUpdate {
    /// An update carrying no result and clearing the error.
    pub fn none() -> Self {
        Self::default()
    }

    /// An update carrying a result.
    pub fn with_result(result: DownloadResult) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    /// An update carrying an error message.
    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }

    /// Attach an error message to an update that already carries a result.
    pub fn and_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Trait for durable task storage backends.
///
/// All mutations validate status changes against the state machine, stamp
/// `updated_at` and persist before returning. Reads are served from the
/// bounded in-memory cache with the persisted file as fall-back, so the
/// store - not the cache - is the source of truth.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task record. Fails with [`TaskStoreError::DuplicateId`]
    /// if the id already exists. Persists immediately.
    async fn create(&self, task: Task) -> Result<Task, TaskStoreError>;

    /// Get a task by id.
    async fn get(&self, id: &str) -> Result<Option<Task>, TaskStoreError>;

    /// List all tasks.
    async fn list(&self) -> Result<Vec<Task>, TaskStoreError>;

    /// List tasks currently in the given status.
    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, TaskStoreError>;

    /// Change a task's status, merging the update's fields.
    ///
    /// Fails with [`TaskStoreError::NotFound`] for unknown ids and
    /// [`TaskStoreError::TransitionRejected`] when the state machine does
    /// not allow the change. Clears `process_id` on any transition out of
    /// Running.
    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        update: StatusUpdate,
    ) -> Result<Task, TaskStoreError>;

    /// Record or clear the OS process id attached to a task.
    ///
    /// Not a status change; no transition validation applies.
    async fn set_process_id(
        &self,
        id: &str,
        process_id: Option<u32>,
    ) -> Result<Task, TaskStoreError>;
}
