//! Testing utilities and mock implementations for integration tests.
//!
//! This module provides mock implementations of the external collaborator
//! traits (extraction handler, metadata fetcher, process probe), allowing
//! full lifecycle testing without a real extraction engine.
//!
//! # Example
//!
//! ```rust,ignore
//! use sluice_core::testing::{MockJobHandler, MockMetaFetcher, MockProbe};
//!
//! let handler = MockJobHandler::new();
//! let fetcher = MockMetaFetcher::new();
//! let probe = MockProbe::new();
//!
//! // Configure mock responses
//! handler.fail_with("engine exited with code 1").await;
//! probe.set_alive(1234, true).await;
//!
//! // Wire into a DownloadOrchestrator...
//! ```

mod mock_handler;
mod mock_meta;
mod mock_probe;

pub use mock_handler::{MockJobHandler, RecordedPerform};
pub use mock_meta::MockMetaFetcher;
pub use mock_probe::MockProbe;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::task::{DownloadEntry, EntryStatus, SourceMeta, Task, TaskKind};

    /// Create a test task with reasonable defaults.
    pub fn task(id: &str, kind: TaskKind) -> Task {
        Task::new(
            id,
            kind,
            serde_json::json!({
                "locator": format!("https://example.com/watch/{id}"),
                "params": {"format": "best"},
            }),
        )
    }

    /// Create test metadata for a video source.
    pub fn video_meta(id: &str, title: &str) -> SourceMeta {
        SourceMeta::new(id, title)
            .with_duration(213.0)
            .with_uploader("test-channel")
    }

    /// Create a completed playlist entry.
    pub fn playlist_entry(index: u32, title: &str) -> DownloadEntry {
        let mut entry = DownloadEntry::new(
            format!("entry-{index}"),
            title,
            format!("files/playlist/{index:02}_{title}.mp4"),
        );
        entry.playlist_index = Some(index);
        entry.status = EntryStatus::Success;
        entry
    }
}
