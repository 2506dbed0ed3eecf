//! Boot configuration.
//!
//! # Data Flow
//! ```text
//! optional TOML file (--config)
//!     → loader.rs (parse, then SETTINGS_* env overrides)
//!     → validation.rs (semantic checks)
//!     → BootConfig (selects the store, server knobs)
//!
//! With RELOAD=true and the file store:
//!     watcher.rs sees the store file change
//!     → SettingsHandle::reload
//!     → logging reconfigured
//! ```
//!
//! # Design Decisions
//! - Boot config is read once; runtime settings live in the store
//! - All fields have defaults so no file is needed

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{BootConfig, ServerConfig, StoreConfig};
pub use watcher::StoreWatcher;
