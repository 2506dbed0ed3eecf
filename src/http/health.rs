//! Unauthenticated health endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use super::server::AppState;

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn live() -> impl IntoResponse {
    Json(json!({ "status": "alive" }))
}

/// Ready when the store can be read and no restart is pending.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    if state.restart.is_requested() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "restarting" })),
        );
    }

    let store = state.settings.store();
    match store.read_all().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "store": store.describe() })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, store = %store.describe(), "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
