//! HTTP-level tests for the validator API.

mod common;

use serde_json::{Value, json};

use common::assertions::{assert_content_type, assert_operation_outcome, assert_status, has_error};
use common::fixtures::{batch, patient};
use common::harness::{post_fhir, post_fhir_with_query, post_raw, test_server, unready_server};
use helios_validator_rest::ServerConfig;

// ============================================================================
// POST /validate
// ============================================================================

#[tokio::test]
async fn test_validate_valid_patient() {
    let server = test_server(ServerConfig::for_testing());

    let response = post_fhir(&server, "/validate", &patient("male")).await;

    assert_status(&response, 200);
    assert_content_type(&response, "application/fhir+json");
    let body: Value = response.json();
    assert_operation_outcome(&body);
    assert!(!has_error(&body));
}

#[tokio::test]
async fn test_validate_invalid_patient_is_still_200() {
    let server = test_server(ServerConfig::for_testing());

    let response = post_fhir(&server, "/validate", &patient("invalid")).await;

    assert_status(&response, 200);
    let body: Value = response.json();
    let issue = assert_operation_outcome(&body);
    assert_eq!(issue["severity"], "error");
    assert_eq!(issue["expression"][0], "Patient.gender");
}

#[tokio::test]
async fn test_validate_malformed_json_yields_fatal_outcome() {
    let server = test_server(ServerConfig::for_testing());

    let response = post_raw(&server, "/validate", "application/json", b"{ not json".to_vec()).await;

    assert_status(&response, 200);
    let body: Value = response.json();
    assert_eq!(assert_operation_outcome(&body)["severity"], "fatal");
}

#[tokio::test]
async fn test_validate_list_format() {
    let server = test_server(ServerConfig::for_testing());

    let response = post_fhir_with_query(
        &server,
        "/validate",
        &[("format", "list")],
        &patient("invalid"),
    )
    .await;

    assert_status(&response, 200);
    let body: Value = response.json();
    let messages = body["messages"].as_array().expect("messages array");
    let gender = messages
        .iter()
        .find(|m| m["location"] == "Patient.gender")
        .expect("gender message");
    assert_eq!(gender["severity"], "error");
    assert_eq!(gender["type"], "code-invalid");
    assert!(gender["message"].as_str().unwrap().contains("administrative-gender"));
}

#[tokio::test]
async fn test_validate_unknown_format_is_400() {
    let server = test_server(ServerConfig::for_testing());

    let response =
        post_fhir_with_query(&server, "/validate", &[("format", "yaml")], &patient("male")).await;

    assert_status(&response, 400);
    let body: Value = response.json();
    assert_eq!(assert_operation_outcome(&body)["code"], "invalid");
}

#[tokio::test]
async fn test_validate_unsupported_content_type_is_415() {
    let server = test_server(ServerConfig::for_testing());

    let response = post_raw(
        &server,
        "/validate",
        "application/fhir+xml",
        b"<Patient xmlns=\"http://hl7.org/fhir\"/>".to_vec(),
    )
    .await;

    assert_status(&response, 415);
    let body: Value = response.json();
    assert_eq!(assert_operation_outcome(&body)["code"], "not-supported");
}

#[tokio::test]
async fn test_validate_with_profiles() {
    let server = test_server(ServerConfig::for_testing());

    let response = post_fhir_with_query(
        &server,
        "/validate",
        &[
            ("profile", "http://hl7.org/fhir/StructureDefinition/Patient"),
            ("profile", " "),
        ],
        &patient("male"),
    )
    .await;
    assert_status(&response, 200);
    assert!(!has_error(&response.json::<Value>()));

    let response = post_fhir_with_query(
        &server,
        "/validate",
        &[(
            "profile",
            "http://hl7.org/fhir/StructureDefinition/Patient,http://example.org/fhir/StructureDefinition/unknown",
        )],
        &patient("male"),
    )
    .await;
    assert_status(&response, 200);
    assert!(has_error(&response.json::<Value>()));
}

#[tokio::test]
async fn test_validate_without_narrative() {
    let mut config = ServerConfig::for_testing();
    config.validator.remove_narrative_text = true;
    let server = test_server(config);

    let response = post_fhir(&server, "/validate", &patient("male")).await;

    assert_status(&response, 200);
    assert!(response.json::<Value>().get("text").is_none());
}

// ============================================================================
// POST /validateBundle
// ============================================================================

#[tokio::test]
async fn test_validate_bundle() {
    let server = test_server(ServerConfig::for_testing());
    let request = batch(vec![
        ("urn:uuid:a", patient("male")),
        ("urn:uuid:b", patient("invalid")),
    ]);

    let response = post_fhir(&server, "/validateBundle", &request).await;

    assert_status(&response, 200);
    assert_content_type(&response, "application/fhir+json");
    let body: Value = response.json();
    assert_eq!(body["resourceType"], "Bundle");
    assert_eq!(body["type"], "batch-response");
    assert_eq!(body["entry"][0]["fullUrl"], "urn:uuid:a");
    assert_eq!(body["entry"][1]["fullUrl"], "urn:uuid:b");
    assert!(!has_error(&body["entry"][0]["response"]["outcome"]));
    assert!(has_error(&body["entry"][1]["response"]["outcome"]));
}

#[tokio::test]
async fn test_validate_bundle_duplicate_full_url_is_400() {
    let server = test_server(ServerConfig::for_testing());
    let request = batch(vec![
        ("urn:uuid:a", patient("male")),
        ("urn:uuid:a", patient("female")),
    ]);

    let response = post_fhir(&server, "/validateBundle", &request).await;

    assert_status(&response, 400);
    let body: Value = response.json();
    let issue = assert_operation_outcome(&body);
    assert_eq!(issue["code"], "invalid");
    let details = issue["details"]["text"].as_str().unwrap();
    assert!(details.contains("entry[1]"), "{details}");
    assert!(details.contains("urn:uuid:a"), "{details}");
}

#[tokio::test]
async fn test_validate_bundle_wrong_type_is_400() {
    let server = test_server(ServerConfig::for_testing());
    let request = json!({
        "resourceType": "Bundle",
        "type": "collection",
        "entry": []
    });

    let response = post_fhir(&server, "/validateBundle", &request).await;

    assert_status(&response, 400);
    let body: Value = response.json();
    let details = assert_operation_outcome(&body)["details"]["text"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(details.contains("collection"), "{details}");
}

#[tokio::test]
async fn test_validate_bundle_not_a_bundle_is_400() {
    let server = test_server(ServerConfig::for_testing());

    let response = post_fhir(&server, "/validateBundle", &patient("male")).await;
    assert_status(&response, 400);

    let response = post_raw(&server, "/validateBundle", "application/json", b"[1,2]".to_vec()).await;
    assert_status(&response, 400);
}

// ============================================================================
// Introspection and health
// ============================================================================

#[tokio::test]
async fn test_info() {
    let server = test_server(ServerConfig::for_testing());

    let response = server.get("/info").await;

    assert_status(&response, 200);
    let body: Value = response.json();
    assert_eq!(body["fhirVersion"], "4.0.1");
    assert_eq!(body["appVersion"], env!("CARGO_PKG_VERSION"));
    assert!(
        body["engineVersion"]
            .as_str()
            .unwrap()
            .starts_with("helios-structural/")
    );
    assert!(
        body["loadedPackages"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p == "hl7.fhir.r4.core#4.0.1")
    );
    assert!(
        body["properties"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p == "FHIR Version: 4.0.1")
    );
}

#[tokio::test]
async fn test_index_page() {
    let server = test_server(ServerConfig::for_testing());

    let response = server.get("/").await;

    assert_status(&response, 200);
    assert_content_type(&response, "text/html");
    let html = response.text();
    assert!(html.contains("Helios FHIR Validator"));
    assert!(html.contains("FHIR Version: 4.0.1"));
}

#[tokio::test]
async fn test_health() {
    let server = test_server(ServerConfig::for_testing());

    let response = server.get("/health").await;
    assert_status(&response, 200);
    assert_eq!(response.json::<Value>()["status"], "healthy");

    let response = server.get("/_liveness").await;
    assert_status(&response, 200);
}

#[tokio::test]
async fn test_unready_engine_is_503() {
    let server = unready_server();

    let response = post_fhir(&server, "/validate", &patient("male")).await;
    assert_status(&response, 503);
    let body: Value = response.json();
    assert_eq!(assert_operation_outcome(&body)["code"], "transient");

    let empty = json!({ "resourceType": "Bundle", "type": "batch" });
    let response = post_fhir(&server, "/validateBundle", &empty).await;
    assert_status(&response, 503);

    let response = server.get("/info").await;
    assert_status(&response, 503);

    let response = server.get("/health").await;
    assert_status(&response, 503);
}
