//! Mock extraction handler for testing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::orchestrator::{JobFailure, JobHandler, JobOutput};
use crate::task::Task;

/// A recorded handler invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedPerform {
    /// Task the handler was invoked for.
    pub task_id: String,
    /// Locator passed to the handler.
    pub locator: String,
    /// Output template passed to the handler.
    pub output_template: String,
}

/// Scripted behavior for the next perform calls.
#[derive(Debug, Clone)]
enum Script {
    Succeed(JobOutput),
    Fail(String),
    Panic(String),
}

/// Mock implementation of the JobHandler trait.
///
/// Provides controllable behavior for testing:
/// - Script success, failure or panic
/// - Add artificial latency to simulate a long extraction
/// - Record invocations for assertions
///
/// # Example
///
/// ```rust,ignore
/// let handler = MockJobHandler::new();
/// handler.succeed_with(JobOutput::ok("done")).await;
/// handler.set_delay(Duration::from_millis(50)).await;
///
/// // ...submit a task through the orchestrator...
///
/// let calls = handler.recorded_performs().await;
/// assert_eq!(calls.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockJobHandler {
    script: Arc<RwLock<Script>>,
    delay: Arc<RwLock<Duration>>,
    recorded: Arc<RwLock<Vec<RecordedPerform>>>,
}

impl Default for MockJobHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockJobHandler {
    /// Create a mock handler that succeeds instantly with no entries.
    pub fn new() -> Self {
        Self {
            script: Arc::new(RwLock::new(Script::Succeed(JobOutput::ok("mock download ok")))),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            recorded: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Script the handler to succeed with the given output.
    pub async fn succeed_with(&self, output: JobOutput) {
        *self.script.write().await = Script::Succeed(output);
    }

    /// Script the handler to fail with the given message.
    pub async fn fail_with(&self, message: impl Into<String>) {
        *self.script.write().await = Script::Fail(message.into());
    }

    /// Script the handler to panic with the given message.
    pub async fn panic_with(&self, message: impl Into<String>) {
        *self.script.write().await = Script::Panic(message.into());
    }

    /// Add artificial latency before the scripted outcome.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Get all recorded perform calls.
    pub async fn recorded_performs(&self) -> Vec<RecordedPerform> {
        self.recorded.read().await.clone()
    }

    /// Number of times perform was invoked.
    pub async fn perform_count(&self) -> usize {
        self.recorded.read().await.len()
    }
}

#[async_trait]
impl JobHandler for MockJobHandler {
    async fn perform(
        &self,
        task_id: String,
        locator: String,
        _task: Task,
        output_template: String,
    ) -> Result<JobOutput, JobFailure> {
        self.recorded.write().await.push(RecordedPerform {
            task_id,
            locator,
            output_template,
        });

        let delay = *self.delay.read().await;
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }

        match self.script.read().await.clone() {
            Script::Succeed(output) => Ok(output),
            Script::Fail(message) => Err(JobFailure::new(message)),
            Script::Panic(message) => panic!("{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::task::TaskKind;

    use super::*;

    fn test_task() -> Task {
        Task::new("t-1", TaskKind::Video, json!({}))
    }

    #[tokio::test]
    async fn test_default_succeeds_and_records() {
        let handler = MockJobHandler::new();

        let result = handler
            .perform(
                "t-1".to_string(),
                "https://example.com".to_string(),
                test_task(),
                "tpl".to_string(),
            )
            .await;

        assert!(result.is_ok());
        let calls = handler.recorded_performs().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].locator, "https://example.com");
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let handler = MockJobHandler::new();
        handler.fail_with("engine exploded").await;

        let result = handler
            .perform(
                "t-1".to_string(),
                "x".to_string(),
                test_task(),
                "tpl".to_string(),
            )
            .await;

        assert_eq!(result.unwrap_err().message, "engine exploded");
    }
}
