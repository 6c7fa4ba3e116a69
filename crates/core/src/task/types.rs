//! Core task data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Status Types
// ============================================================================

/// Lifecycle status of a task.
///
/// State machine flow:
/// ```text
/// Pending -> Running -> Success
///    |          |
///    v          v
/// Cancelled  Failed
///
/// Failed and Cancelled can re-enter Pending via retry.
/// Success is terminal.
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task created, waiting to be executed.
    Pending,
    /// The external extraction process is running.
    Running,
    /// Task completed successfully (terminal).
    Success,
    /// Task failed; may be retried.
    Failed,
    /// Task was cancelled by an operator; may be retried.
    Cancelled,
}

impl TaskStatus {
    /// Returns true if no outgoing transitions exist right now.
    ///
    /// Failed and Cancelled are terminal until retried; Success is always
    /// terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Returns true if the task can be retried from this status.
    pub fn can_retry(&self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Cancelled)
    }

    /// Returns true if the task can be cancelled from this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }

    /// Returns the status as a string (for filtering and logs).
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single produced entry.
///
/// Extends [`TaskStatus`] with transient entry-level states that exist while
/// a collection task is still running: some entries may already be complete
/// (`Partial`) or mid-transfer (`Downloading`) inside a Running parent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
    /// Entry finished while sibling entries are still in flight.
    Partial,
    /// Entry transfer is in progress.
    Downloading,
}

impl From<TaskStatus> for EntryStatus {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => EntryStatus::Pending,
            TaskStatus::Running => EntryStatus::Running,
            TaskStatus::Success => EntryStatus::Success,
            TaskStatus::Failed => EntryStatus::Failed,
            TaskStatus::Cancelled => EntryStatus::Cancelled,
        }
    }
}

// ============================================================================
// Task Kind
// ============================================================================

/// The kind of extraction workflow that produced a task.
///
/// This is a closed set: recovery after a restart resolves the handler for a
/// kind from an explicit registry, never by dynamic lookup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Single video extraction.
    Video,
    /// Audio extraction from a single source.
    Audio,
    /// Playlist or channel extraction producing many entries.
    Playlist,
}

impl TaskKind {
    /// Returns true for kinds that produce more than one entry.
    pub fn is_collection(&self) -> bool {
        matches!(self, TaskKind::Playlist)
    }

    /// Returns the kind as a string (for logs).
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Video => "video",
            TaskKind::Audio => "audio",
            TaskKind::Playlist => "playlist",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Metadata and Result Types
// ============================================================================

/// Pre-flight metadata fetched before execution.
///
/// Attached to a task once and never overwritten. Engines report arbitrary
/// extra fields; those are preserved verbatim in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SourceMeta {
    /// Source-assigned identifier.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Duration in seconds, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Uploader or channel name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    /// Any additional engine-reported fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SourceMeta {
    /// Create metadata with just an id and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration: None,
            uploader: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the duration in seconds.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = Some(secs);
        self
    }

    /// Set the uploader name.
    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }
}

/// One produced artifact within a task's result.
///
/// Single-item tasks produce exactly one entry; collection tasks produce one
/// per item, with per-entry status while the parent is still running.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadEntry {
    /// Entry identifier (source id, or the task id for synthesized entries).
    pub id: String,
    /// Entry title.
    pub title: String,
    /// Path the artifact was written to (may be a template until resolved).
    pub path: String,
    /// Public URL for the artifact, once issued by the upload collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Entry-level status.
    pub status: EntryStatus,
    /// Progress percentage (0-100).
    pub progress: u8,
    /// Size in bytes, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Duration in seconds, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Uploader name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    /// File extension, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    /// 1-based index within a playlist, for collection entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_index: Option<u32>,
    /// Entry-level error message, if this entry failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadEntry {
    /// Create a successful entry with the minimum required fields.
    pub fn new(id: impl Into<String>, title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            path: path.into(),
            download_url: None,
            status: EntryStatus::Success,
            progress: 100,
            size: None,
            duration: None,
            uploader: None,
            ext: None,
            playlist_index: None,
            error: None,
        }
    }
}

/// The produced-artifact record of a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadResult {
    /// Produced entries (one for single items, many for collections).
    pub entries: Vec<DownloadEntry>,
    /// Overall result status.
    pub status: TaskStatus,
    /// Overall progress percentage (0-100).
    pub progress: u8,
    /// Overall error message, if the task failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadResult {
    /// The empty result a task starts with at submission.
    pub fn pending() -> Self {
        Self {
            entries: Vec::new(),
            status: TaskStatus::Pending,
            progress: 0,
            error: None,
        }
    }

    /// A successful result carrying the produced entries.
    pub fn success(entries: Vec<DownloadEntry>) -> Self {
        Self {
            entries,
            status: TaskStatus::Success,
            progress: 100,
            error: None,
        }
    }

    /// A failed result carrying the failure message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            status: TaskStatus::Failed,
            progress: 0,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Task
// ============================================================================

/// A tracked unit of extraction work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier (UUID), generated at submission, immutable.
    pub id: String,

    /// Which extraction workflow produced this task.
    pub kind: TaskKind,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// When the task was created.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp; stamped on every mutation.
    pub updated_at: DateTime<Utc>,

    /// Original request parameters, opaque to the store, replayed on retry.
    pub input: serde_json::Value,

    /// Pre-flight metadata; attached once, never overwritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SourceMeta>,

    /// Produced-artifact record.
    pub result: DownloadResult,

    /// Last terminal failure message; cleared on retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// OS process id of the attached external command.
    ///
    /// Present only while the task is Running; used exclusively for
    /// supervision, never for correctness of the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(id: impl Into<String>, kind: TaskKind, input: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            input,
            meta: None,
            result: DownloadResult::pending(),
            error: None,
            process_id: None,
        }
    }

    /// Attach pre-flight metadata.
    pub fn with_meta(mut self, meta: SourceMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal_flags() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_retry_flags() {
        assert!(TaskStatus::Failed.can_retry());
        assert!(TaskStatus::Cancelled.can_retry());
        assert!(!TaskStatus::Success.can_retry());
        assert!(!TaskStatus::Pending.can_retry());
        assert!(!TaskStatus::Running.can_retry());
    }

    #[test]
    fn test_status_cancel_flags() {
        assert!(TaskStatus::Pending.can_cancel());
        assert!(TaskStatus::Running.can_cancel());
        assert!(!TaskStatus::Success.can_cancel());
        assert!(!TaskStatus::Failed.can_cancel());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TaskStatus::Running).unwrap();
        assert_eq!(json, r#""running""#);
        let parsed: TaskStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TaskStatus::Running);
    }

    #[test]
    fn test_entry_status_from_task_status() {
        assert_eq!(EntryStatus::from(TaskStatus::Success), EntryStatus::Success);
        assert_eq!(EntryStatus::from(TaskStatus::Pending), EntryStatus::Pending);
    }

    #[test]
    fn test_kind_collection_flag() {
        assert!(TaskKind::Playlist.is_collection());
        assert!(!TaskKind::Video.is_collection());
        assert!(!TaskKind::Audio.is_collection());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&TaskKind::Playlist).unwrap();
        assert_eq!(json, r#""playlist""#);
    }

    #[test]
    fn test_source_meta_extra_fields_roundtrip() {
        let json = r#"{"id":"abc","title":"Some Video","duration":12.5,"webpage_url":"https://example.com/v/abc"}"#;
        let meta: SourceMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.id, "abc");
        assert_eq!(meta.duration, Some(12.5));
        assert_eq!(
            meta.extra.get("webpage_url").and_then(|v| v.as_str()),
            Some("https://example.com/v/abc")
        );

        let back = serde_json::to_string(&meta).unwrap();
        assert!(back.contains("webpage_url"));
    }

    #[test]
    fn test_download_result_constructors() {
        let pending = DownloadResult::pending();
        assert_eq!(pending.status, TaskStatus::Pending);
        assert_eq!(pending.progress, 0);
        assert!(pending.entries.is_empty());

        let success = DownloadResult::success(vec![DownloadEntry::new("e1", "title", "/tmp/a")]);
        assert_eq!(success.status, TaskStatus::Success);
        assert_eq!(success.progress, 100);
        assert_eq!(success.entries.len(), 1);

        let failed = DownloadResult::failed("boom");
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new("t1", TaskKind::Video, serde_json::json!({"url": "x"}));
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.process_id.is_none());
        assert!(task.error.is_none());
        assert_eq!(task.result, DownloadResult::pending());
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn test_task_serialization_roundtrip() {
        let task = Task::new("t1", TaskKind::Audio, serde_json::json!({"url": "x"}))
            .with_meta(SourceMeta::new("src", "Title").with_uploader("someone"));
        let json = serde_json::to_string(&task).unwrap();
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn test_task_skips_absent_optional_fields() {
        let task = Task::new("t1", TaskKind::Video, serde_json::Value::Null);
        let json = serde_json::to_string(&task).unwrap();
        assert!(!json.contains("process_id"));
        assert!(!json.contains("meta"));
        // the top-level error field is absent; result has no error either
        assert!(!json.contains("error"));
    }
}
