//! Error types for the validator HTTP API.
//!
//! Every error is returned as a FHIR OperationOutcome with the matching HTTP
//! status code.
//!
//! # Error Mapping
//!
//! | Validator Error | HTTP Status | FHIR Issue Code |
//! |-----------------|-------------|-----------------|
//! | Bundle / UnsupportedVersion | 400 | invalid |
//! | EngineNotReady / Pool | 503 | transient |
//! | EngineUnavailable / Serialization | 500 | exception |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helios_validator::ValidatorError;
use std::fmt;
use tracing::error;

/// The primary error type for HTTP API operations.
#[derive(Debug)]
pub enum RestError {
    /// Bad request - the caller can fix the input (HTTP 400).
    BadRequest {
        /// Error message.
        message: String,
    },

    /// Unsupported media type (HTTP 415).
    UnsupportedMediaType {
        /// The unsupported content type.
        content_type: String,
    },

    /// The validation engine cannot serve requests (HTTP 503).
    ServiceUnavailable {
        /// Error message.
        message: String,
    },

    /// Internal server error (HTTP 500).
    InternalError {
        /// Error message.
        message: String,
    },
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::BadRequest { message } => {
                write!(f, "Bad request: {}", message)
            }
            RestError::UnsupportedMediaType { content_type } => {
                write!(f, "Unsupported media type: {}", content_type)
            }
            RestError::ServiceUnavailable { message } => {
                write!(f, "Service unavailable: {}", message)
            }
            RestError::InternalError { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for RestError {}

impl RestError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            RestError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RestError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RestError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, details) = match &self {
            RestError::BadRequest { message } => ("invalid", message.clone()),
            RestError::UnsupportedMediaType { content_type } => (
                "not-supported",
                format!("Content type '{}' is not supported", content_type),
            ),
            RestError::ServiceUnavailable { message } => ("transient", message.clone()),
            RestError::InternalError { message } => ("exception", message.clone()),
        };

        let severity = if status.is_server_error() {
            "fatal"
        } else {
            "error"
        };
        let operation_outcome = create_operation_outcome(severity, code, &details);
        (status, Json(operation_outcome)).into_response()
    }
}

/// Creates a FHIR OperationOutcome resource.
///
/// # Arguments
///
/// * `severity` - The issue severity (fatal, error, warning, information)
/// * `code` - The FHIR issue code
/// * `details` - Human-readable details
fn create_operation_outcome(severity: &str, code: &str, details: &str) -> serde_json::Value {
    serde_json::json!({
        "resourceType": "OperationOutcome",
        "issue": [{
            "severity": severity,
            "code": code,
            "details": {
                "text": details
            }
        }]
    })
}

impl From<ValidatorError> for RestError {
    fn from(err: ValidatorError) -> Self {
        if err.is_caller_error() {
            RestError::BadRequest {
                message: err.to_string(),
            }
        } else if err.is_unavailable() {
            RestError::ServiceUnavailable {
                message: err.to_string(),
            }
        } else {
            error!(error = %err, "Validation request failed");
            RestError::InternalError {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::InternalError {
            message: format!("Failed to serialize response: {}", err),
        }
    }
}

/// Result type for HTTP API operations.
pub type RestResult<T> = Result<T, RestError>;
