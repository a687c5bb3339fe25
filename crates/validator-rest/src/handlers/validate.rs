//! Single-resource validation handler.

use axum::{
    Json,
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use helios_validator::{Engine, ResourceFormat};
use tracing::debug;

use crate::content_type::{FHIR_JSON, require_json};
use crate::error::{RestError, RestResult};
use crate::state::AppState;

/// Shape of the validation response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// A serialized OperationOutcome.
    #[default]
    Outcome,
    /// A `{"messages": [...]}` document.
    List,
}

impl OutputFormat {
    /// Parses the `format` query parameter.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outcome" | "" => Some(OutputFormat::Outcome),
            "list" => Some(OutputFormat::List),
            _ => None,
        }
    }
}

/// Query parameters of `POST /validate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidateParams {
    /// Profile identifiers in request order.
    pub profiles: Vec<String>,
    /// Requested output shape.
    pub format: OutputFormat,
}

impl ValidateParams {
    /// Parses the raw query string.
    ///
    /// `profile` may repeat, and each value may hold several identifiers
    /// separated by commas, semicolons or whitespace.
    pub fn parse(query: Option<&str>) -> RestResult<Self> {
        let mut params = ValidateParams::default();
        let Some(query) = query else {
            return Ok(params);
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "profile" => params.profiles.extend(
                    value
                        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                        .filter(|p| !p.is_empty())
                        .map(str::to_string),
                ),
                "format" => {
                    params.format =
                        OutputFormat::parse(&value).ok_or_else(|| RestError::BadRequest {
                            message: format!(
                                "Unknown format '{}' (expected 'outcome' or 'list')",
                                value
                            ),
                        })?;
                }
                _ => {}
            }
        }

        Ok(params)
    }
}

/// Handler for single-resource validation.
///
/// # HTTP Request
///
/// `POST [base]/validate?profile=[url]&format=outcome|list`
///
/// # Response
///
/// - `200 OK` - The OperationOutcome (or message list), whether or not the
///   resource is valid
/// - `400 Bad Request` - Unknown `format`
/// - `415 Unsupported Media Type` - Body is not JSON
/// - `503 Service Unavailable` - Engine not ready
pub async fn validate_handler<E: Engine>(
    State(state): State<AppState<E>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> RestResult<Response> {
    require_json(&headers)?;
    let params = ValidateParams::parse(query.as_deref())?;
    debug!(
        bytes = body.len(),
        profiles = ?params.profiles,
        format = ?params.format,
        "Processing validate request"
    );

    let result = state
        .service()
        .validate(body.to_vec(), ResourceFormat::Json, params.profiles)
        .await?;

    match params.format {
        OutputFormat::Outcome => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, FHIR_JSON)],
            result.outcome_bytes,
        )
            .into_response()),
        OutputFormat::List => Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "messages": result.messages })),
        )
            .into_response()),
    }
}
