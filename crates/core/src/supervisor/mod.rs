//! Process supervision for subprocess-backed tasks.
//!
//! Tracks the OS process attached to each running task, repairs tasks whose
//! process died without a status update (orphans) at boot, and force-kills
//! everything still running at shutdown.

mod probe;

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use crate::task::{StatusUpdate, Task, TaskStatus, TaskStore, TaskStoreError};

pub use probe::{ProcessProbe, SystemProbe};

/// Diagnostic recorded on tasks whose process vanished without an update.
const ORPHAN_DEAD_PROCESS: &str = "process exited without status update";
/// Diagnostic recorded on running tasks that never recorded a process id.
const ORPHAN_MISSING_PID: &str = "missing process id";
/// Diagnostic recorded on tasks killed during graceful shutdown.
const KILLED_AT_SHUTDOWN: &str = "terminated at shutdown";

/// Error type for supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
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

    /// Task store error.
    #[error("task store error: {0}")]
    Store(#[from] TaskStoreError),
}

/// Supervises the OS processes backing running tasks.
pub struct ProcessSupervisor {
    store: Arc<dyn TaskStore>,
    probe: Arc<dyn ProcessProbe>,
}

impl ProcessSupervisor {
    /// Create a supervisor over the given store and probe.
    pub fn new(store: Arc<dyn TaskStore>, probe: Arc<dyn ProcessProbe>) -> Self {
        Self { store, probe }
    }

    /// Create a supervisor using the platform probe.
    pub fn with_system_probe(store: Arc<dyn TaskStore>) -> Self {
        Self::new(store, Arc::new(SystemProbe::new()))
    }

    /// Record the process id backing a task.
    pub async fn attach(&self, task_id: &str, pid: u32) -> Result<Task, SupervisorError> {
        Ok(self.store.set_process_id(task_id, Some(pid)).await?)
    }

    /// Clear the process id from a task.
    pub async fn detach(&self, task_id: &str) -> Result<Task, SupervisorError> {
        Ok(self.store.set_process_id(task_id, None).await?)
    }

    /// Returns true if the given pid is alive. Never errors.
    pub async fn is_alive(&self, pid: u32) -> bool {
        self.probe.is_alive(pid).await
    }

    /// Repair orphaned tasks after a crash or restart.
    ///
    /// Runs once at boot, before any new task is accepted. Every task still
    /// recorded as Running either lost its process (pid dead) or never
    /// recorded one; both are transitioned to Failed with a diagnostic so
    /// nothing stays stuck as Running forever.
    pub async fn reconcile_orphans(&self) -> Result<usize, SupervisorError> {
        let running = self.store.list_by_status(TaskStatus::Running).await?;
        if running.is_empty() {
            return Ok(0);
        }

        info!(count = running.len(), "checking running tasks for orphans");

        let checks = running.into_iter().map(|task| async move {
            let reason = match task.process_id {
                Some(pid) => {
                    if self.probe.is_alive(pid).await {
                        return false;
                    }
                    ORPHAN_DEAD_PROCESS
                }
                None => ORPHAN_MISSING_PID,
            };

            warn!(task_id = %task.id, reason, "found orphaned task");
            match self
                .store
                .update_status(&task.id, TaskStatus::Failed, StatusUpdate::with_error(reason))
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "failed to repair orphaned task");
                    false
                }
            }
        });

        let repaired = join_all(checks).await.into_iter().filter(|r| *r).count();
        if repaired > 0 {
            info!(repaired, "orphaned tasks marked failed");
        }
        Ok(repaired)
    }

    /// Kill every live process backing a Running task.
    ///
    /// Runs once at shutdown. All terminations run concurrently and the call
    /// returns only after every one has finished, so the process may exit
    /// without leaving extraction engines behind.
    pub async fn terminate_all(&self) -> Result<usize, SupervisorError> {
        let running = self.store.list_by_status(TaskStatus::Running).await?;
        if running.is_empty() {
            return Ok(0);
        }

        info!(count = running.len(), "terminating running task processes");

        let kills = running.into_iter().map(|task| async move {
            let Some(pid) = task.process_id else {
                return false;
            };

            if self.probe.terminate(pid).await {
                info!(task_id = %task.id, pid, "terminated task process");
            } else {
                warn!(task_id = %task.id, pid, "could not terminate process, may have already exited");
            }

            match self
                .store
                .update_status(
                    &task.id,
                    TaskStatus::Failed,
                    StatusUpdate::with_error(KILLED_AT_SHUTDOWN),
                )
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "failed to mark task failed at shutdown");
                    false
                }
            }
        });

        let terminated = join_all(kills).await.into_iter().filter(|r| *r).count();
        info!(terminated, "shutdown termination finished");
        Ok(terminated)
    }

    /// Operator-initiated cancellation of a running task.
    ///
    /// Kills the attached process when one is recorded, then transitions the
    /// task to Cancelled. Refuses tasks that are not Running.
    pub async fn cancel(&self, task_id: &str) -> Result<Task, SupervisorError> {
        let task = self
            .store
            .get(task_id)
            .await?
            .ok_or_else(|| SupervisorError::NotFound(task_id.to_string()))?;

        if task.status != TaskStatus::Running {
            return Err(SupervisorError::InvalidState {
                id: task_id.to_string(),
                status: task.status,
                operation: "cancel",
            });
        }

        if let Some(pid) = task.process_id {
            if self.probe.terminate(pid).await {
                info!(task_id, pid, "terminated process for cancelled task");
            } else {
                warn!(task_id, pid, "could not terminate process, may have already exited");
            }
        }

        let task = self
            .store
            .update_status(
                task_id,
                TaskStatus::Cancelled,
                StatusUpdate::with_error("cancelled by operator"),
            )
            .await?;
        Ok(task)
    }
}
