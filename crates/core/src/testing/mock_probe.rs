//! Mock process probe for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::supervisor::ProcessProbe;

/// Mock implementation of the ProcessProbe trait.
///
/// Provides controllable behavior for testing:
/// - Script liveness per pid
/// - Count terminate calls for assertions
/// - Simulate kills that fail
///
/// # Example
///
/// ```rust,ignore
/// let probe = MockProbe::new();
/// probe.set_alive(1234, true).await;
///
/// assert!(probe.is_alive(1234).await);
/// probe.terminate(1234).await;
/// assert_eq!(probe.terminate_calls(1234).await, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockProbe {
    /// Scripted liveness per pid; unknown pids are dead.
    alive: Arc<RwLock<HashMap<u32, bool>>>,
    /// Number of terminate calls per pid.
    terminations: Arc<RwLock<HashMap<u32, u32>>>,
    /// When true, terminate reports failure but still counts the call.
    fail_terminations: Arc<RwLock<bool>>,
}

impl MockProbe {
    /// Create a new mock probe with no live processes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script whether a pid is alive.
    pub async fn set_alive(&self, pid: u32, alive: bool) {
        self.alive.write().await.insert(pid, alive);
    }

    /// Make every terminate call report failure.
    pub async fn set_fail_terminations(&self, fail: bool) {
        *self.fail_terminations.write().await = fail;
    }

    /// Number of times terminate was invoked for a pid.
    pub async fn terminate_calls(&self, pid: u32) -> u32 {
        self.terminations.read().await.get(&pid).copied().unwrap_or(0)
    }

    /// Total terminate invocations across all pids.
    pub async fn total_terminate_calls(&self) -> u32 {
        self.terminations.read().await.values().sum()
    }
}

#[async_trait]
impl ProcessProbe for MockProbe {
    async fn is_alive(&self, pid: u32) -> bool {
        self.alive.read().await.get(&pid).copied().unwrap_or(false)
    }

    async fn terminate(&self, pid: u32) -> bool {
        *self.terminations.write().await.entry(pid).or_insert(0) += 1;

        if *self.fail_terminations.read().await {
            return false;
        }

        self.alive.write().await.insert(pid, false);
        true
    }
}
