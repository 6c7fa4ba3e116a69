//! Download orchestrator: drives tasks from submission to terminal state.
//!
//! - **Submission**: validate, pre-flight metadata, create Pending
//! - **Execution**: one concurrent unit of work per task, sync or
//!   fire-and-forget
//! - **Recovery**: boot-time re-invocation of handlers for unfinished tasks

mod config;
mod handler;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use handler::{JobFailure, JobHandler, JobOutput, MetaError, MetaFetcher};
pub use runner::DownloadOrchestrator;
pub use types::{OrchestratorError, StoredInput, SubmitOutcome, SubmitRequest};
