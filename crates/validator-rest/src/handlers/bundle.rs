//! Batch bundle validation handler.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use helios_validator::Engine;
use tracing::debug;

use crate::content_type::{FHIR_JSON, require_json};
use crate::error::RestResult;
use crate::state::AppState;

/// Handler for bundle validation.
///
/// Each entry is validated on its own; the response is a `batch-response`
/// bundle with one outcome per entry, in request order.
///
/// # HTTP Request
///
/// `POST [base]/validateBundle`
///
/// # Response
///
/// - `200 OK` - The response bundle
/// - `400 Bad Request` - The bundle is structurally invalid; no entry was
///   validated
/// - `415 Unsupported Media Type` - Body is not JSON
/// - `503 Service Unavailable` - Engine not ready
pub async fn validate_bundle_handler<E: Engine>(
    State(state): State<AppState<E>>,
    headers: HeaderMap,
    body: Bytes,
) -> RestResult<Response> {
    require_json(&headers)?;
    debug!(bytes = body.len(), "Processing validateBundle request");

    let result = state.service().validate_bundle(body.to_vec()).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, FHIR_JSON)],
        result.bundle_bytes,
    )
        .into_response())
}
