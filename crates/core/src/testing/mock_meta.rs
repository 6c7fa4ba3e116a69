//! Mock metadata fetcher for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::orchestrator::{MetaError, MetaFetcher};
use crate::task::SourceMeta;

/// Mock implementation of the MetaFetcher trait.
///
/// Returns a scripted [`SourceMeta`] or a scripted error, and records the
/// locators it was asked about.
#[derive(Debug)]
pub struct MockMetaFetcher {
    response: Arc<RwLock<Result<SourceMeta, String>>>,
    recorded: Arc<RwLock<Vec<String>>>,
}

impl Default for MockMetaFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMetaFetcher {
    /// Create a fetcher returning a generic test meta record.
    pub fn new() -> Self {
        Self {
            response: Arc::new(RwLock::new(Ok(SourceMeta::new("mock-id", "Mock Title")))),
            recorded: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Script the meta record to return.
    pub async fn set_meta(&self, meta: SourceMeta) {
        *self.response.write().await = Ok(meta);
    }

    /// Script every fetch to fail with the given message.
    pub async fn fail_with(&self, message: impl Into<String>) {
        *self.response.write().await = Err(message.into());
    }

    /// Locators fetch_meta was called with.
    pub async fn recorded_locators(&self) -> Vec<String> {
        self.recorded.read().await.clone()
    }
}

#[async_trait]
impl MetaFetcher for MockMetaFetcher {
    async fn fetch_meta(&self, locator: &str) -> Result<SourceMeta, MetaError> {
        self.recorded.write().await.push(locator.to_string());
        self.response
            .read()
            .await
            .clone()
            .map_err(MetaError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_meta() {
        let fetcher = MockMetaFetcher::new();
        let meta = fetcher.fetch_meta("https://example.com").await.unwrap();
        assert_eq!(meta.id, "mock-id");
        assert_eq!(fetcher.recorded_locators().await.len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let fetcher = MockMetaFetcher::new();
        fetcher.fail_with("no network").await;
        let err = fetcher.fetch_meta("x").await.unwrap_err();
        assert_eq!(err.to_string(), "no network");
    }
}
