//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce tracing events
//!     → reloadable EnvFilter (LOG_LEVEL, RUST_LOG)
//!     → console fmt layer
//!     → file fmt layer (tracing-appender, rolling, non-blocking)
//!
//! HTTP requests:
//!     → x-request-id (UUID v4) set and propagated
//!     → TraceLayer span per request
//! ```
//!
//! # Design Decisions
//! - Log level changes apply live through a reload handle
//! - Log file path, rotation and retention changes swap the file writer live
//! - The non-blocking writer guard flushes on drop, before exit

pub mod logging;

pub use logging::{LogReconfigure, LoggingError, LoggingGuard, LoggingHandle};
