//! Runtime settings service.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod settings;
pub mod store;

pub use config::schema::BootConfig;
pub use error::SettingsError;
pub use http::HttpServer;
pub use lifecycle::{RestartSignal, Shutdown};
pub use settings::{Settings, SettingsHandle};
