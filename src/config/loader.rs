//! Boot configuration loading: optional TOML file, then environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::BootConfig;
use crate::config::validation::{validate_config, ConfigValidationError};

pub const ENV_USE_DB: &str = "SETTINGS_USE_DB";
pub const ENV_DB_PATH: &str = "SETTINGS_DB_PATH";
pub const ENV_ENV_PATH: &str = "SETTINGS_ENV_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ConfigValidationError>),
}

fn join(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load the boot configuration.
///
/// Without a file the defaults are used. Process environment overrides both.
pub fn load_config(path: Option<&Path>) -> Result<BootConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&content)?
        }
        None => BootConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// `SETTINGS_USE_DB` selects the table store only for `1`, `true` or `True`.
pub fn apply_env_overrides(config: &mut BootConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(flag) = lookup(ENV_USE_DB) {
        config.store.use_db = matches!(flag.trim(), "1" | "true" | "True");
    }
    if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.is_empty()) {
        config.store.db_path = PathBuf::from(path);
    }
    if let Some(path) = lookup(ENV_ENV_PATH).filter(|p| !p.is_empty()) {
        config.store.env_path = PathBuf::from(path);
    }
}
