//! Download orchestrator implementation.
//!
//! Drives each task from submission to its terminal state: pre-flight
//! metadata, the Running transition, the extraction callback, and the
//! normalized result record. Every task runs as its own tokio task with no
//! ordering guarantee between tasks; steps within one task are strictly
//! sequential.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::supervisor::ProcessSupervisor;
use crate::task::{
    DownloadEntry, DownloadResult, StatusUpdate, Task, TaskKind, TaskStatus, TaskStore,
};

use super::config::OrchestratorConfig;
use super::handler::{JobHandler, MetaFetcher};
use super::types::{OrchestratorError, StoredInput, SubmitOutcome, SubmitRequest};

/// The download orchestrator - drives tasks through their lifecycle.
pub struct DownloadOrchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn TaskStore>,
    supervisor: Arc<ProcessSupervisor>,
    meta_fetcher: Option<Arc<dyn MetaFetcher>>,
    handlers: HashMap<TaskKind, Arc<dyn JobHandler>>,
    running: AtomicBool,
}

impl DownloadOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn TaskStore>,
        supervisor: Arc<ProcessSupervisor>,
    ) -> Self {
        Self {
            config,
            store,
            supervisor,
            meta_fetcher: None,
            handlers: HashMap::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Attach the metadata collaborator.
    pub fn with_meta_fetcher(mut self, fetcher: Arc<dyn MetaFetcher>) -> Self {
        self.meta_fetcher = Some(fetcher);
        self
    }

    /// Register the extraction handler for a task kind.
    ///
    /// The registry is closed at construction; recovery resolves handlers
    /// from it and nothing else.
    pub fn with_handler(mut self, kind: TaskKind, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Start the orchestrator.
    ///
    /// Runs the boot barriers to completion before accepting submissions:
    /// orphan reconciliation first, then recovery of unfinished tasks.
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        if self.running.load(Ordering::SeqCst) {
            warn!("orchestrator already running");
            return Ok(());
        }

        info!("starting download orchestrator");

        self.supervisor.reconcile_orphans().await?;

        if self.config.recover_on_start {
            self.recover_unfinished().await?;
        }

        self.running.store(true, Ordering::SeqCst);
        info!("download orchestrator started");
        Ok(())
    }

    /// Stop accepting work and terminate every live task process.
    ///
    /// Returns only after all terminations have finished.
    pub async fn shutdown(&self) -> Result<(), OrchestratorError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("orchestrator not running");
            return Ok(());
        }

        info!("shutting down download orchestrator");
        self.supervisor.terminate_all().await?;
        info!("download orchestrator stopped");
        Ok(())
    }

    /// Whether the orchestrator is accepting submissions.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Submit a new extraction task.
    ///
    /// Synchronous submissions return the terminal outcome; asynchronous
    /// ones return immediately with the new task id and Pending status, and
    /// the caller polls [`get`](Self::get) for the result. Execution-time
    /// failures are captured into the task record, never returned here.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitOutcome, OrchestratorError> {
        if !self.is_running() {
            return Err(OrchestratorError::NotRunning);
        }

        if request.locator.trim().is_empty() {
            return Err(OrchestratorError::InvalidParam(
                "locator must not be empty".to_string(),
            ));
        }

        let handler = self
            .handlers
            .get(&request.kind)
            .cloned()
            .ok_or_else(|| {
                OrchestratorError::InvalidParam(format!(
                    "no handler registered for kind {}",
                    request.kind
                ))
            })?;

        let task_id = uuid::Uuid::new_v4().to_string();
        let locator = request.locator.trim().to_string();
        let template = request
            .output_template
            .clone()
            .unwrap_or_else(|| self.config.default_output_template.clone());

        // Pre-flight metadata is best-effort; the task proceeds without it.
        let meta = match &self.meta_fetcher {
            Some(fetcher) => match fetcher.fetch_meta(&locator).await {
                Ok(meta) => Some(meta),
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "metadata fetch failed, proceeding without");
                    None
                }
            },
            None => None,
        };

        let stored = StoredInput {
            locator: locator.clone(),
            output_template: request.output_template,
            params: request.params,
        };
        let mut task = Task::new(task_id.clone(), request.kind, stored.to_value());
        if let Some(meta) = meta {
            task = task.with_meta(meta);
        }
        self.store.create(task).await?;
        debug!(task_id = %task_id, kind = %request.kind, "task created");

        if request.sync {
            Ok(Self::run_task(
                Arc::clone(&self.store),
                handler,
                task_id,
                locator,
                template,
            )
            .await)
        } else {
            let store = Arc::clone(&self.store);
            let spawned_id = task_id.clone();
            tokio::spawn(async move {
                Self::run_task(store, handler, spawned_id, locator, template).await;
            });

            Ok(SubmitOutcome {
                task_id,
                status: TaskStatus::Pending,
                message: "task submitted".to_string(),
            })
        }
    }

    /// Get a task by id.
    pub async fn get(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        self.store
            .get(task_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(task_id.to_string()))
    }

    /// List tasks currently in the given status.
    pub async fn list_by_status(
        &self,
        status: TaskStatus,
    ) -> Result<Vec<Task>, OrchestratorError> {
        Ok(self.store.list_by_status(status).await?)
    }

    /// Cancel a running task, killing its process if one is attached.
    pub async fn cancel(&self, task_id: &str) -> Result<Task, OrchestratorError> {
        Ok(self.supervisor.cancel(task_id).await?)
    }

    /// Retry a failed or cancelled task.
    ///
    /// Re-enters the task at Pending with its error cleared (the previous
    /// result stays visible until overwritten) and re-schedules execution
    /// through the handler registry.
    pub async fn retry(&self, task_id: &str) -> Result<SubmitOutcome, OrchestratorError> {
        let task = self.get(task_id).await?;

        if !task.status.can_retry() {
            return Err(OrchestratorError::InvalidState {
                id: task_id.to_string(),
                status: task.status,
                operation: "retry",
            });
        }

        self.store
            .update_status(task_id, TaskStatus::Pending, StatusUpdate::none())
            .await?;
        info!(%task_id, "task reset to pending for retry");

        self.schedule_stored(&task);

        Ok(SubmitOutcome {
            task_id: task_id.to_string(),
            status: TaskStatus::Pending,
            message: "task restarted".to_string(),
        })
    }

    /// Re-invoke handlers for every task a restart left unfinished.
    ///
    /// Kinds without a registered handler are logged and left for manual
    /// retry; nothing outside the registry is ever invoked.
    async fn recover_unfinished(&self) -> Result<usize, OrchestratorError> {
        let mut unfinished = self.store.list_by_status(TaskStatus::Pending).await?;
        unfinished.extend(self.store.list_by_status(TaskStatus::Running).await?);

        if unfinished.is_empty() {
            return Ok(0);
        }

        info!(count = unfinished.len(), "recovering unfinished tasks");

        let mut scheduled = 0;
        for task in &unfinished {
            if self.schedule_stored(task) {
                scheduled += 1;
            }
        }
        Ok(scheduled)
    }

    /// Schedule execution of an existing task from its stored input.
    ///
    /// Returns false when the kind has no handler or the stored input cannot
    /// be decoded; the task is left as-is in both cases.
    fn schedule_stored(&self, task: &Task) -> bool {
        let Some(handler) = self.handlers.get(&task.kind).cloned() else {
            info!(
                task_id = %task.id,
                kind = %task.kind,
                "no handler registered for kind, leaving task for manual retry"
            );
            return false;
        };

        let Some(stored) = StoredInput::from_value(&task.input) else {
            warn!(task_id = %task.id, "stored input is not replayable, leaving task as-is");
            return false;
        };

        let template = stored
            .output_template
            .unwrap_or_else(|| self.config.default_output_template.clone());

        let store = Arc::clone(&self.store);
        let task_id = task.id.clone();
        tokio::spawn(async move {
            Self::run_task(store, handler, task_id, stored.locator, template).await;
        });
        true
    }

    /// The per-task execution routine.
    ///
    /// Transition to Running, invoke the handler, and record the normalized
    /// outcome. The handler runs on its own tokio task so a panic inside it
    /// is captured into the task record like any reported failure.
    async fn run_task(
        store: Arc<dyn TaskStore>,
        handler: Arc<dyn JobHandler>,
        task_id: String,
        locator: String,
        template: String,
    ) -> SubmitOutcome {
        let task = match store.get(&task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!(%task_id, "task disappeared before execution");
                return SubmitOutcome {
                    task_id,
                    status: TaskStatus::Failed,
                    message: "task disappeared before execution".to_string(),
                };
            }
            Err(e) => {
                warn!(%task_id, error = %e, "could not load task for execution");
                return SubmitOutcome {
                    task_id,
                    status: TaskStatus::Failed,
                    message: e.to_string(),
                };
            }
        };

        // Recovered tasks may already be Running; everything else enters
        // through Pending.
        if task.status != TaskStatus::Running {
            if let Err(e) = store
                .update_status(&task_id, TaskStatus::Running, StatusUpdate::none())
                .await
            {
                warn!(%task_id, error = %e, "could not start task");
                return Self::outcome_from_store(&store, &task_id, e.to_string()).await;
            }
        }

        let perform = {
            let handler = Arc::clone(&handler);
            let task_id = task_id.clone();
            let locator = locator.clone();
            let template = template.clone();
            let task = task.clone();
            tokio::spawn(async move { handler.perform(task_id, locator, task, template).await })
        };

        match perform.await {
            Ok(Ok(output)) => {
                // Multi-entry outputs are recorded verbatim; otherwise a
                // single entry is synthesized from the task metadata.
                let entries = output
                    .entries
                    .unwrap_or_else(|| vec![Self::synthesize_entry(&task, &template)]);
                let result = DownloadResult::success(entries);

                match store
                    .update_status(
                        &task_id,
                        TaskStatus::Success,
                        StatusUpdate::with_result(result),
                    )
                    .await
                {
                    Ok(_) => {
                        info!(%task_id, "task completed");
                        SubmitOutcome {
                            task_id,
                            status: TaskStatus::Success,
                            message: output.message,
                        }
                    }
                    Err(e) => {
                        warn!(%task_id, error = %e, "could not record task success");
                        Self::outcome_from_store(&store, &task_id, e.to_string()).await
                    }
                }
            }
            Ok(Err(failure)) => {
                let result = DownloadResult::failed(&failure.message);
                if let Err(e) = store
                    .update_status(
                        &task_id,
                        TaskStatus::Failed,
                        StatusUpdate::with_result(result).and_error(&failure.message),
                    )
                    .await
                {
                    warn!(%task_id, error = %e, "could not record task failure");
                }
                info!(%task_id, error = %failure.message, "task failed");
                SubmitOutcome {
                    task_id,
                    status: TaskStatus::Failed,
                    message: failure.message,
                }
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    format!("extraction callback panicked: {join_error}")
                } else {
                    "extraction callback was aborted".to_string()
                };
                if let Err(e) = store
                    .update_status(
                        &task_id,
                        TaskStatus::Failed,
                        StatusUpdate::with_error(&message),
                    )
                    .await
                {
                    warn!(%task_id, error = %e, "could not record callback crash");
                }
                warn!(%task_id, error = %message, "task crashed");
                SubmitOutcome {
                    task_id,
                    status: TaskStatus::Failed,
                    message,
                }
            }
        }
    }

    /// Build an outcome reflecting whatever status the store holds now.
    ///
    /// Used when a terminal transition was refused, e.g. because the task
    /// was cancelled while the handler ran.
    async fn outcome_from_store(
        store: &Arc<dyn TaskStore>,
        task_id: &str,
        message: String,
    ) -> SubmitOutcome {
        let status = match store.get(task_id).await {
            Ok(Some(task)) => task.status,
            _ => TaskStatus::Failed,
        };
        SubmitOutcome {
            task_id: task_id.to_string(),
            status,
            message,
        }
    }

    /// Synthesize the single produced entry for a task whose handler did not
    /// report any.
    fn synthesize_entry(task: &Task, template: &str) -> DownloadEntry {
        let meta = task.meta.as_ref();
        let mut entry = DownloadEntry::new(
            meta.map(|m| m.id.clone())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| task.id.clone()),
            meta.map(|m| m.title.clone()).unwrap_or_default(),
            template,
        );
        entry.duration = meta.and_then(|m| m.duration);
        entry.uploader = meta.and_then(|m| m.uploader.clone());
        entry
    }
}
