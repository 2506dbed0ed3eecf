//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming admin request:
//!     → admin::auth middleware extracts `Authorization: Bearer <jwt>`
//!     → token.rs verifies against the live snapshot's secrets
//!     → capability (user/admin) checked against the route's requirement
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Secrets are read from the current snapshot per request, so rotating a
//!   secret needs no restart
//! - Fail closed: any verification failure rejects the request

pub mod token;

pub use token::{authorize, issue_token, verify_token, AuthError, Principal, Role};
