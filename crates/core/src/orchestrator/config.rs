//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the download orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Re-invoke handlers for unfinished tasks during `start`.
    ///
    /// When disabled, tasks left Pending by a restart stay put until an
    /// operator retries them.
    #[serde(default = "default_recover_on_start")]
    pub recover_on_start: bool,

    /// Output-location template used when a submission does not provide one.
    #[serde(default = "default_output_template")]
    pub default_output_template: String,
}

fn default_recover_on_start() -> bool {
    true
}

fn default_output_template() -> String {
    "%(title)s.%(ext)s".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            recover_on_start: default_recover_on_start(),
            default_output_template: default_output_template(),
        }
    }
}
