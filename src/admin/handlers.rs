use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SettingsError;
use crate::http::server::AppState;
use crate::settings::Applied;

#[derive(Debug, Default, Deserialize)]
pub struct WriteParams {
    #[serde(default)]
    pub restart: bool,
}

/// Body of the single-key routes.
#[derive(Debug, Deserialize)]
pub struct SingleValue {
    pub value: Value,
}

#[derive(Debug, Serialize)]
pub struct WriteResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub restart: bool,
}

impl WriteResponse {
    fn added(applied: Applied) -> Self {
        Self {
            ok: true,
            added: Some(applied.values),
            updated: None,
            restart: applied.restart_requested,
        }
    }

    fn updated(applied: Applied) -> Self {
        Self {
            ok: true,
            added: None,
            updated: Some(applied.values),
            restart: applied.restart_requested,
        }
    }
}

pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Value>>, SettingsError> {
    Ok(Json(state.admin.read_all().await?))
}

pub async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<BTreeMap<String, Value>>, SettingsError> {
    let value = state.admin.read_one(&key).await?;
    Ok(Json(BTreeMap::from([(key, value)])))
}

pub async fn put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<WriteParams>,
    Json(body): Json<SingleValue>,
) -> Result<Json<WriteResponse>, SettingsError> {
    let updates = BTreeMap::from([(key, body.value)]);
    let applied = state.admin.create(&updates, params.restart).await?;
    Ok(Json(WriteResponse::added(applied)))
}

pub async fn post_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<WriteParams>,
    Json(body): Json<SingleValue>,
) -> Result<Json<WriteResponse>, SettingsError> {
    let updates = BTreeMap::from([(key, body.value)]);
    let applied = state.admin.update(&updates, params.restart).await?;
    Ok(Json(WriteResponse::updated(applied)))
}

pub async fn put_settings_bulk(
    State(state): State<AppState>,
    Query(params): Query<WriteParams>,
    Json(updates): Json<BTreeMap<String, Value>>,
) -> Result<Json<WriteResponse>, SettingsError> {
    let applied = state.admin.create(&updates, params.restart).await?;
    Ok(Json(WriteResponse::added(applied)))
}

pub async fn post_settings_bulk(
    State(state): State<AppState>,
    Query(params): Query<WriteParams>,
    Json(updates): Json<BTreeMap<String, Value>>,
) -> Result<Json<WriteResponse>, SettingsError> {
    let applied = state.admin.update(&updates, params.restart).await?;
    Ok(Json(WriteResponse::updated(applied)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_response_shape() {
        let applied = Applied {
            values: BTreeMap::from([("K".to_string(), "v".to_string())]),
            restart_requested: false,
        };
        let body = serde_json::to_value(WriteResponse::added(applied)).unwrap();
        assert_eq!(body, serde_json::json!({ "ok": true, "added": { "K": "v" } }));

        let applied = Applied {
            values: BTreeMap::new(),
            restart_requested: true,
        };
        let body = serde_json::to_value(WriteResponse::updated(applied)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "ok": true, "updated": {}, "restart": true })
        );
    }
}
