//! HTTP surface of the settings service.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, trace span, timeout)
//!     → /health*          health.rs (no auth)
//!     → /admin/settings*  admin router (bearer token, role check)
//!     → JSON response
//! ```

pub mod health;
pub mod server;

pub use server::{AppState, HttpServer, X_REQUEST_ID};
