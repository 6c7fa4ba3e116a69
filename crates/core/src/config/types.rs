use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::orchestrator::OrchestratorConfig;
use crate::retry::RetryPolicy;
use crate::task::StoreOptions;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            store: StoreConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl Config {
    /// Orchestrator config with the output template defaulted against the
    /// storage layout when the file did not set one explicitly.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let mut config = self.orchestrator.clone();
        if config.default_output_template == OrchestratorConfig::default().default_output_template
        {
            config.default_output_template = self.storage.default_output_template();
        }
        config
    }
}

/// Storage layout configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory holding the task file and produced artifacts.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./.storage")
}

impl StorageConfig {
    /// Path of the persisted task file.
    pub fn tasks_file(&self) -> PathBuf {
        self.root.join("tasks.json")
    }

    /// Directory produced artifacts are written to.
    pub fn files_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    /// Default engine output template under [`files_dir`](Self::files_dir).
    pub fn default_output_template(&self) -> String {
        format!("{}/%(title)s.%(ext)s", self.files_dir().display())
    }
}

/// Task store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Maximum number of task records held in the in-memory cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Attempts for each durable write (including the first).
    #[serde(default = "default_persist_attempts")]
    pub persist_max_attempts: u32,
    /// Delay between write attempts, in milliseconds.
    #[serde(default = "default_persist_backoff_ms")]
    pub persist_backoff_ms: u64,
    /// Deadline per write attempt, in milliseconds.
    #[serde(default = "default_persist_deadline_ms")]
    pub persist_deadline_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            persist_max_attempts: default_persist_attempts(),
            persist_backoff_ms: default_persist_backoff_ms(),
            persist_deadline_ms: default_persist_deadline_ms(),
        }
    }
}

fn default_cache_capacity() -> usize {
    256
}

fn default_persist_attempts() -> u32 {
    3
}

fn default_persist_backoff_ms() -> u64 {
    100
}

fn default_persist_deadline_ms() -> u64 {
    2000
}

impl StoreConfig {
    /// Convert into store options.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            cache_capacity: self.cache_capacity,
            persist_policy: RetryPolicy::fixed(
                self.persist_max_attempts,
                Duration::from_millis(self.persist_backoff_ms),
            ),
            persist_deadline: Duration::from_millis(self.persist_deadline_ms),
        }
    }
}
