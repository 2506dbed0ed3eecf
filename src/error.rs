//! Errors of the settings mutation protocol and their HTTP mapping.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Values that do not fit their declared type, by key.
    #[error("validation failed for {} key(s)", .0.len())]
    Validation(BTreeMap<String, String>),

    /// Keys that already exist on a create.
    #[error("settings already exist: {0:?}")]
    Conflict(Vec<String>),

    /// Keys that do not exist on an update.
    #[error("settings do not exist: {0:?}")]
    Missing(Vec<String>),

    #[error("settings are immutable: {0:?}")]
    Immutable(Vec<String>),

    #[error("setting '{0}' not found")]
    NotFound(String),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

impl SettingsError {
    pub fn status(&self) -> StatusCode {
        match self {
            SettingsError::Validation(_) | SettingsError::Missing(_) => StatusCode::BAD_REQUEST,
            SettingsError::Conflict(_) => StatusCode::CONFLICT,
            SettingsError::Immutable(_) => StatusCode::FORBIDDEN,
            SettingsError::NotFound(_) => StatusCode::NOT_FOUND,
            SettingsError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SettingsError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            SettingsError::Validation(errors) => json!({ "validation_errors": errors }),
            SettingsError::Conflict(keys) => json!({ "conflicts": keys }),
            SettingsError::Missing(keys) => json!({ "missing": keys }),
            SettingsError::Immutable(keys) => json!({ "immutable": keys }),
            SettingsError::NotFound(_) => json!({ "detail": "Setting not found" }),
            SettingsError::Persistence(e) => {
                tracing::error!(error = ?e, "Settings persistence failed");
                json!({ "detail": "Internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
