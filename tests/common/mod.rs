//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use settings_server::admin::AdminService;
use settings_server::config::ServerConfig;
use settings_server::http::{AppState, HttpServer};
use settings_server::lifecycle::RestartSignal;
use settings_server::security::{issue_token, Role};
use settings_server::settings::{SettingsHandle, UpdatePipeline};
use settings_server::store::{FileStore, SettingsStore, SqliteStore};

/// A fully wired service over a temporary store.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<dyn SettingsStore>,
    pub sqlite: Option<Arc<SqliteStore>>,
    pub dir: TempDir,
}

fn pairs(seed: &[(&str, &str)]) -> BTreeMap<String, String> {
    seed.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Service backed by a SQLite file, seeded before the first snapshot.
pub async fn sqlite_app(seed: &[(&str, &str)]) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = Arc::new(SqliteStore::open(&dir.path().join("settings.db")).await.unwrap());
    if !seed.is_empty() {
        sqlite.write_many(&pairs(seed)).await.unwrap();
    }
    let store: Arc<dyn SettingsStore> = sqlite.clone();
    build(store, Some(sqlite), dir).await
}

/// Service backed by an env file, seeded before the first snapshot.
pub async fn file_app(seed: &[(&str, &str)]) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let file = FileStore::new(&dir.path().join("settings.env"));
    if !seed.is_empty() {
        file.write_many(&pairs(seed)).await.unwrap();
    }
    build(Arc::new(file), None, dir).await
}

async fn build(
    store: Arc<dyn SettingsStore>,
    sqlite: Option<Arc<SqliteStore>>,
    dir: TempDir,
) -> TestApp {
    // Empty environment so the host's variables never leak into a test.
    let handle = Arc::new(SettingsHandle::load(store.clone(), BTreeMap::new()).await.unwrap());
    let restart = Arc::new(RestartSignal::new());
    let pipeline = UpdatePipeline::new(handle.clone(), None, restart.clone());
    let state = AppState {
        admin: Arc::new(AdminService::new(pipeline)),
        settings: handle,
        restart,
    };
    let router = HttpServer::build_router(state.clone(), &ServerConfig::default());

    TestApp {
        router,
        state,
        store,
        sqlite,
        dir,
    }
}

impl TestApp {
    pub fn token(&self, role: Role) -> String {
        issue_token(&self.state.settings.snapshot(), role, Some("tests"), Some(600)).unwrap()
    }

    pub fn admin_token(&self) -> String {
        self.token(Role::Admin)
    }

    pub fn user_token(&self) -> String {
        self.token(Role::User)
    }

    pub async fn stored(&self) -> BTreeMap<String, String> {
        self.store.read_all().await.unwrap()
    }

    /// Send one request through the router and decode the JSON body.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }
}
