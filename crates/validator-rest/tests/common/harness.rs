//! HTTP API test harness.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderValue, header::CONTENT_TYPE};
use axum_test::{TestResponse, TestServer};
use serde_json::Value;

use helios_validator::{
    EngineFactory, EnginePrototype, StructuralEngine, StructuralEngineFactory, ValidationPool,
    ValidationService,
};
use helios_validator_rest::{ServerConfig, create_app_with_config};

/// Creates a test server over the structural engine.
pub fn test_server(config: ServerConfig) -> TestServer {
    let engine = StructuralEngineFactory
        .prepare(
            config.validator.fhir_version().expect("supported version"),
            &config.validator,
        )
        .expect("engine prepares");
    server_with_prototype(EnginePrototype::ready(engine), config)
}

/// Creates a test server whose engine never finished preparing.
pub fn unready_server() -> TestServer {
    server_with_prototype(EnginePrototype::new(), ServerConfig::for_testing())
}

fn server_with_prototype(
    prototype: EnginePrototype<StructuralEngine>,
    config: ServerConfig,
) -> TestServer {
    let pool = ValidationPool::new(Arc::new(prototype), config.workers).expect("pool starts");
    let service = ValidationService::new(pool, config.validator.clone()).expect("service builds");
    let app = create_app_with_config(service, config);
    TestServer::new(app).expect("Failed to create test server")
}

/// POSTs a JSON body as `application/fhir+json`.
pub async fn post_fhir(server: &TestServer, path: &str, body: &Value) -> TestResponse {
    post_raw(
        server,
        path,
        "application/fhir+json",
        serde_json::to_vec(body).expect("body serializes"),
    )
    .await
}

/// POSTs raw bytes with the given content type.
pub async fn post_raw(
    server: &TestServer,
    path: &str,
    content_type: &'static str,
    body: Vec<u8>,
) -> TestResponse {
    server
        .post(path)
        .add_header(CONTENT_TYPE, HeaderValue::from_static(content_type))
        .bytes(Bytes::from(body))
        .await
}

/// POSTs a JSON body as `application/fhir+json` with query parameters.
pub async fn post_fhir_with_query(
    server: &TestServer,
    path: &str,
    params: &[(&str, &str)],
    body: &Value,
) -> TestResponse {
    let mut request = server
        .post(path)
        .add_header(CONTENT_TYPE, HeaderValue::from_static("application/fhir+json"));
    for (key, value) in params {
        request = request.add_query_param(key, value);
    }
    request
        .bytes(Bytes::from(serde_json::to_vec(body).expect("body serializes")))
        .await
}
