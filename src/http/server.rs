//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router (admin API and health checks)
//! - Wire up middleware (request ID, tracing, timeout)
//! - Serve until an OS signal or a restart request, then drain gracefully

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::{setup_admin_router, AdminService};
use crate::config::ServerConfig;
use crate::http::health;
use crate::lifecycle::signals::wait_for_signal;
use crate::lifecycle::RestartSignal;
use crate::settings::SettingsHandle;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub admin: Arc<AdminService>,
    pub settings: Arc<SettingsHandle>,
    pub restart: Arc<RestartSignal>,
}

/// HTTP server for the settings service.
pub struct HttpServer {
    router: Router,
    restart: Arc<RestartSignal>,
}

impl HttpServer {
    pub fn new(state: AppState, config: &ServerConfig) -> Self {
        let restart = state.restart.clone();
        Self {
            router: Self::build_router(state, config),
            restart,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
        let health_routes = Router::new()
            .route("/health", get(health::health))
            .route("/health/live", get(health::live))
            .route("/health/ready", get(health::ready))
            .with_state(state.clone());

        Router::new()
            .merge(setup_admin_router(state))
            .merge(health_routes)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve until shutdown.
    ///
    /// Returns `true` when the server stopped because a restart was requested.
    pub async fn run(self, listener: TcpListener) -> Result<bool, std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let Self { router, restart } = self;
        let mut restart_listener = restart.shutdown().subscribe();
        let shutdown = async move {
            tokio::select! {
                _ = wait_for_signal() => {}
                _ = restart_listener.recv() => {
                    tracing::info!("Draining connections before restart");
                }
            }
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(restart.is_requested())
    }
}
