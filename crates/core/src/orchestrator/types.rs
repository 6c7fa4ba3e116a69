//! Types for the download orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::supervisor::SupervisorError;
use crate::task::{TaskKind, TaskStatus, TaskStoreError};

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Bad request shape; surfaced immediately, never retried.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Task not found.
    #[error("task not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the task's current status.
    #[error("cannot {operation} task {id}: status is {status}")]
    InvalidState {
        id: String,
        status: TaskStatus,
        operation: &'static str,
    },

    /// The orchestrator has not been started or is shutting down.
    #[error("orchestrator is not running")]
    NotRunning,

    /// Task store error.
    #[error("task store error: {0}")]
    Store(#[from] TaskStoreError),

    /// Supervisor error.
    #[error("supervisor error: {0}")]
    Supervisor(SupervisorError),
}

impl From<SupervisorError> for OrchestratorError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::NotFound(id) => OrchestratorError::NotFound(id),
            SupervisorError::InvalidState {
                id,
                status,
                operation,
            } => OrchestratorError::InvalidState {
                id,
                status,
                operation,
            },
            other => OrchestratorError::Supervisor(other),
        }
    }
}

/// A submission request for a new extraction task.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Which extraction workflow to run.
    pub kind: TaskKind,
    /// Source locator (URL or engine-understood identifier).
    pub locator: String,
    /// Arbitrary request parameters, passed through to the handler.
    pub params: serde_json::Value,
    /// Output-location template; the orchestrator default applies when
    /// absent.
    pub output_template: Option<String>,
    /// Run to the terminal state before returning instead of
    /// fire-and-forget.
    pub sync: bool,
}

impl SubmitRequest {
    /// Create an asynchronous submission with empty parameters.
    pub fn new(kind: TaskKind, locator: impl Into<String>) -> Self {
        Self {
            kind,
            locator: locator.into(),
            params: serde_json::Value::Null,
            output_template: None,
            sync: false,
        }
    }

    /// Attach request parameters.
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Set the output-location template.
    pub fn with_output_template(mut self, template: impl Into<String>) -> Self {
        self.output_template = Some(template.into());
        self
    }

    /// Request synchronous execution.
    pub fn synchronous(mut self) -> Self {
        self.sync = true;
        self
    }
}

/// Outcome returned by [`submit`](crate::DownloadOrchestrator::submit).
///
/// For synchronous submissions `status` is the terminal status; for
/// asynchronous ones it is Pending and the caller polls for the result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitOutcome {
    /// Id of the created task.
    pub task_id: String,
    /// Task status at return time.
    pub status: TaskStatus,
    /// Human-readable outcome description.
    pub message: String,
}

/// The stored shape of a task's `input` field.
///
/// The orchestrator owns this envelope so that retry and boot-time recovery
/// can replay a submission from the record alone; the caller's parameters
/// ride along untouched in `params`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredInput {
    /// Source locator.
    pub locator: String,
    /// Output-location template, when one was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_template: Option<String>,
    /// Caller-supplied parameters, opaque to this core.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl StoredInput {
    /// Encode into the task record's `input` value.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Decode from a task record's `input` value.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}
