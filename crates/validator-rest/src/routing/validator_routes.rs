//! Validator route configuration.

use axum::{
    Router,
    routing::{get, post},
};
use helios_validator::Engine;

use crate::handlers;
use crate::state::AppState;

/// Creates all validator API routes.
///
/// # Routes
///
/// - `POST /validate` - Validate a single resource
/// - `POST /validateBundle` - Validate a batch bundle
/// - `GET /info` - Application info
/// - `GET /` - HTML index page
/// - `GET /health` - Health check
/// - `GET /_liveness` - Liveness probe
pub fn create_routes<E: Engine>(state: AppState<E>) -> Router {
    Router::new()
        .route("/", get(handlers::index_handler::<E>))
        .route("/validate", post(handlers::validate_handler::<E>))
        .route(
            "/validateBundle",
            post(handlers::validate_bundle_handler::<E>),
        )
        .route("/info", get(handlers::info_handler::<E>))
        .route("/health", get(handlers::health_handler::<E>))
        .route("/_liveness", get(handlers::liveness_handler))
        // State
        .with_state(state)
}
