//! Boot configuration schema.
//!
//! Only what must be known before the settings store can be read lives here.
//! Everything else is a runtime setting served by the admin API.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root boot configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct BootConfig {
    /// Which settings backend to open.
    pub store: StoreConfig,

    /// HTTP server knobs that are not runtime settings.
    pub server: ServerConfig,
}

/// Settings store selection.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Use the SQLite table store instead of the env file.
    pub use_db: bool,

    /// SQLite database file.
    pub db_path: PathBuf,

    /// `KEY=value` file used when `use_db` is false.
    pub env_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            use_db: true,
            db_path: PathBuf::from("settings.db"),
            env_path: PathBuf::from(".env"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Listen here instead of the `HOST`/`PORT` settings.
    pub bind_override: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            bind_override: None,
        }
    }
}
