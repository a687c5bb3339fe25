//! Request content type checks.

use axum::http::{HeaderMap, header};

use crate::error::{RestError, RestResult};

/// MIME type of FHIR JSON responses.
pub const FHIR_JSON: &str = "application/fhir+json";

/// Media types accepted for request bodies.
const JSON_MEDIA_TYPES: &[&str] = &["application/json", "text/json", "application/fhir+json"];

/// Returns the media type of a Content-Type value, without parameters.
///
/// Example: `"application/fhir+json; fhirVersion=4.0"` → `"application/fhir+json"`
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Requires a JSON request body. A missing Content-Type is treated as JSON.
pub fn require_json(headers: &HeaderMap) -> RestResult<()> {
    let Some(value) = headers.get(header::CONTENT_TYPE) else {
        return Ok(());
    };
    let content_type = value.to_str().unwrap_or_default();
    if JSON_MEDIA_TYPES.contains(&media_type(content_type).as_str()) {
        Ok(())
    } else {
        Err(RestError::UnsupportedMediaType {
            content_type: content_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_content_type(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_media_type() {
        assert_eq!(
            media_type("application/fhir+json; fhirVersion=4.0"),
            "application/fhir+json"
        );
        assert_eq!(media_type(" Application/JSON "), "application/json");
    }

    #[test]
    fn test_json_types_accepted() {
        assert!(require_json(&HeaderMap::new()).is_ok());
        assert!(require_json(&with_content_type("application/json")).is_ok());
        assert!(require_json(&with_content_type("text/json; charset=utf-8")).is_ok());
        assert!(require_json(&with_content_type("application/fhir+json")).is_ok());
    }

    #[test]
    fn test_other_types_rejected() {
        let err = require_json(&with_content_type("application/fhir+xml")).unwrap_err();
        assert!(matches!(err, RestError::UnsupportedMediaType { .. }));
        assert!(require_json(&with_content_type("text/plain")).is_err());
    }
}
