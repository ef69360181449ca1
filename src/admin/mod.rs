//! Admin API: read-only views of the running gateway.
//!
//! Mounted on the main listener under `/admin` when `[admin] enabled = true`
//! and an `api_key` is configured.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(get_routes))
        .route("/admin/breakers", get(get_breakers))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
