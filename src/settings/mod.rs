//! Settings model and update pipeline.
//!
//! # Data Flow
//! ```text
//! Reads:
//!     store.read_all() + captured env + registry defaults
//!     → Settings::initialize (typed, validated)
//!     → SettingsHandle (ArcSwap<Settings>)
//!     → handlers take Arc<Settings> snapshots
//!
//! Writes:
//!     request values
//!     → validation::validate_all (canonical text, all errors at once)
//!     → store.write_many
//!     → SettingsHandle::reload (atomic swap)
//!     → logging reconfigure (best effort)
//!     → restart request (optional)
//! ```

pub mod handle;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod validation;

pub use handle::SettingsHandle;
pub use model::{capture_env, LogLevel, Settings, SettingsSources};
pub use pipeline::{Applied, UpdatePipeline};
pub use validation::{validate_one, ValidationError};
