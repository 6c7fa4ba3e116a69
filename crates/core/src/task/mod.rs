//! Task records, the status state machine and durable task storage.

mod json_store;
mod state;
mod store;
mod types;

pub use json_store::{JsonTaskStore, StoreOptions};
pub use state::is_valid_transition;
pub use store::{StatusUpdate, TaskStore, TaskStoreError};
pub use types::{
    DownloadEntry, DownloadResult, EntryStatus, SourceMeta, Task, TaskKind, TaskStatus,
};
