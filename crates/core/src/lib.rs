pub mod config;
pub mod orchestrator;
pub mod retry;
pub mod supervisor;
pub mod task;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, StorageConfig,
    StoreConfig,
};
pub use orchestrator::{
    DownloadOrchestrator, JobFailure, JobHandler, JobOutput, MetaError, MetaFetcher,
    OrchestratorConfig, OrchestratorError, SubmitOutcome, SubmitRequest,
};
pub use retry::{retry, with_deadline, RetryPolicy};
pub use supervisor::{ProcessProbe, ProcessSupervisor, SupervisorError, SystemProbe};
pub use task::{
    is_valid_transition, DownloadEntry, DownloadResult, EntryStatus, JsonTaskStore, SourceMeta,
    StatusUpdate, StoreOptions, Task, TaskKind, TaskStatus, TaskStore, TaskStoreError,
};
