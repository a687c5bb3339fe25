//! Health check endpoint handlers.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helios_validator::Engine;
use tracing::debug;

use crate::state::AppState;

/// Handler for the health check endpoint.
///
/// # HTTP Request
///
/// `GET [base]/health`
///
/// # Response
///
/// - `200 OK` - The engine prototype is installed
/// - `503 Service Unavailable` - The engine is not ready
pub async fn health_handler<E: Engine>(State(state): State<AppState<E>>) -> Response {
    debug!("Processing health check request");

    let service = state.service();
    let ready = service.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let health_response = serde_json::json!({
        "status": if ready { "healthy" } else { "unavailable" },
        "fhirVersion": service.version().as_str(),
        "workers": service.workers(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    (status, Json(health_response)).into_response()
}

/// Handler for a liveness probe.
///
/// # HTTP Request
///
/// `GET [base]/_liveness`
pub async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}
