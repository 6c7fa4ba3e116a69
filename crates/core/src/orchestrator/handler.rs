//! Collaborator seams consumed by the orchestrator.
//!
//! The concrete extraction engine lives outside this core; only its result
//! contract crosses these traits.

use async_trait::async_trait;
use thiserror::Error;

use crate::task::{DownloadEntry, SourceMeta, Task};

/// Successful output of an extraction callback.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    /// Human-readable completion message.
    pub message: String,
    /// Produced entries, when the handler reports them itself (collections).
    /// When absent the orchestrator synthesizes a single entry from the
    /// task's metadata.
    pub entries: Option<Vec<DownloadEntry>>,
}

impl JobOutput {
    /// A completion without handler-reported entries.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            entries: None,
        }
    }

    /// Attach handler-reported entries (used verbatim by the orchestrator).
    pub fn with_entries(mut self, entries: Vec<DownloadEntry>) -> Self {
        self.entries = Some(entries);
        self
    }
}

/// Failure reported by an extraction callback.
///
/// Captured into the task's terminal state, never thrown to an async
/// submitter.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct JobFailure {
    /// Human-readable failure message.
    pub message: String,
}

impl JobFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The per-kind extraction callback.
///
/// Handlers are registered with the orchestrator at construction, one per
/// [`TaskKind`](crate::TaskKind); boot-time recovery re-invokes the same
/// handler with the stored input, so implementations must tolerate being
/// called again for a task they already worked on.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run the extraction for one task.
    ///
    /// Blocks for as long as the external engine runs. The handler is
    /// expected to attach the engine's pid through the supervisor while the
    /// command is alive.
    async fn perform(
        &self,
        task_id: String,
        locator: String,
        task: Task,
        output_template: String,
    ) -> Result<JobOutput, JobFailure>;
}

/// Error from the metadata collaborator.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct MetaError(pub String);

/// Pre-flight metadata lookup.
///
/// Best-effort: a failure is logged and the task proceeds without metadata.
#[async_trait]
pub trait MetaFetcher: Send + Sync {
    /// Fetch metadata for a source locator.
    async fn fetch_meta(&self, locator: &str) -> Result<SourceMeta, MetaError>;
}
