//! Settings admin API.
//!
//! # Routes
//! ```text
//! GET  /admin/settings          user   merged view (secrets redacted)
//! GET  /admin/settings/{key}    user   single key, 404 if absent
//! PUT  /admin/settings/{key}    admin  create one key
//! POST /admin/settings/{key}    admin  update one key
//! PUT  /admin/settings          admin  create many keys
//! POST /admin/settings          admin  update many keys
//! ```
//! Write routes accept `?restart=true`.

pub mod auth;
pub mod handlers;
pub mod protocol;

use axum::{middleware, routing::get, Router};

use self::auth::{require_admin, require_user};
use self::handlers::*;
use crate::http::server::AppState;

pub use protocol::{AdminService, Mutation};

pub fn setup_admin_router(state: AppState) -> Router {
    let reads = Router::new()
        .route("/admin/settings", get(get_settings))
        .route("/admin/settings/{key}", get(get_setting))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    let writes = Router::new()
        .route(
            "/admin/settings",
            axum::routing::put(put_settings_bulk).post(post_settings_bulk),
        )
        .route(
            "/admin/settings/{key}",
            axum::routing::put(put_setting).post(post_setting),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    reads.merge(writes).with_state(state)
}
