//! HTTP response assertions.

use axum_test::TestResponse;
use serde_json::Value;

/// Asserts that the response has the expected status code.
pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status_code().as_u16();
    assert_eq!(
        actual, expected,
        "Expected status {}, got {}: {}",
        expected,
        actual,
        response.text()
    );
}

/// Asserts that the response has the given media type.
pub fn assert_content_type(response: &TestResponse, expected: &str) {
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(
        content_type.starts_with(expected),
        "Expected content type {}, got {}",
        expected,
        content_type
    );
}

/// Asserts that the body is an OperationOutcome and returns its first issue.
pub fn assert_operation_outcome(body: &Value) -> &Value {
    assert_eq!(
        body["resourceType"], "OperationOutcome",
        "Expected an OperationOutcome, got {}",
        body
    );
    let issues = body["issue"].as_array().expect("issue array");
    assert!(!issues.is_empty(), "OperationOutcome has no issues");
    &issues[0]
}

/// Returns true if any issue of the outcome has severity error or fatal.
pub fn has_error(outcome: &Value) -> bool {
    outcome["issue"]
        .as_array()
        .map(|issues| {
            issues
                .iter()
                .any(|i| i["severity"] == "error" || i["severity"] == "fatal")
        })
        .unwrap_or(false)
}
