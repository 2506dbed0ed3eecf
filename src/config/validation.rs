//! Boot configuration validation.
//!
//! Returns every problem at once, not just the first.

use std::net::SocketAddr;

use super::schema::BootConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ConfigValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

pub fn validate_config(config: &BootConfig) -> Result<(), Vec<ConfigValidationError>> {
    let mut errors = Vec::new();

    if config.store.use_db && config.store.db_path.as_os_str().is_empty() {
        errors.push(ConfigValidationError::new("store.db_path", "must not be empty"));
    }
    if !config.store.use_db && config.store.env_path.as_os_str().is_empty() {
        errors.push(ConfigValidationError::new("store.env_path", "must not be empty"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ConfigValidationError::new(
            "server.request_timeout_secs",
            "must be greater than zero",
        ));
    }
    if let Some(addr) = &config.server.bind_override {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ConfigValidationError::new(
                "server.bind_override",
                format!("'{addr}' is not a socket address"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
