use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Store cache capacity and persistence budget are non-zero
/// - Storage root is non-empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.storage.root.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "storage.root cannot be empty".to_string(),
        ));
    }

    if config.store.cache_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "store.cache_capacity must be greater than 0".to_string(),
        ));
    }

    if config.store.persist_max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "store.persist_max_attempts must be greater than 0".to_string(),
        ));
    }

    if config.store.persist_deadline_ms == 0 {
        return Err(ConfigError::ValidationError(
            "store.persist_deadline_ms must be greater than 0".to_string(),
        ));
    }

    Ok(())
}
