//! # helios-validator-rest - HTTP API for the Helios FHIR Validator
//!
//! This crate exposes a [`ValidationService`] over HTTP with
//! [axum](https://docs.rs/axum).
//!
//! ## API Endpoints
//!
//! | Operation | HTTP Method | URL Pattern |
//! |-----------|-------------|-------------|
//! | validate resource | POST | `/validate?profile=..&format=outcome\|list` |
//! | validate bundle | POST | `/validateBundle` |
//! | application info | GET | `/info` |
//! | index page | GET | `/` |
//! | health | GET | `/health`, `/_liveness` |
//!
//! ## Error Handling
//!
//! Validation findings are never HTTP errors: an invalid resource still
//! returns `200 OK` with its OperationOutcome. HTTP errors are reserved for
//! requests that could not be validated at all, and are returned as FHIR
//! OperationOutcome resources:
//!
//! | HTTP Status | FHIR Issue Code | Description |
//! |-------------|-----------------|-------------|
//! | 400 | invalid | Malformed bundle, unknown output format |
//! | 415 | not-supported | Body is not JSON |
//! | 500 | exception | Unexpected server fault |
//! | 503 | transient | Engine not ready |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use helios_validator::{
//!     EngineFactory, EnginePrototype, StructuralEngineFactory, ValidationPool, ValidationService,
//! };
//! use helios_validator_rest::{ServerConfig, create_app_with_config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::default();
//!     let engine = StructuralEngineFactory
//!         .prepare(config.validator.fhir_version()?, &config.validator)?;
//!     let pool = ValidationPool::new(Arc::new(EnginePrototype::ready(engine)), config.workers)?;
//!     let service = ValidationService::new(pool, config.validator.clone())?;
//!
//!     let app = create_app_with_config(service, config.clone());
//!     let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`error`] - Error types and OperationOutcome generation
//! - [`config`] - Server configuration
//! - [`state`] - Application state (validation service, configuration)
//! - [`handlers`] - HTTP request handlers
//! - [`content_type`] - Request content type checks
//! - [`routing`] - Route configuration

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod content_type;
pub mod error;
pub mod handlers;
pub mod routing;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{RestError, RestResult};
pub use state::AppState;

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};
use helios_validator::{Engine, ValidationService};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Creates the Axum application with custom configuration.
///
/// # Arguments
///
/// * `service` - The validation service (worker pool and engine)
/// * `config` - Server configuration
pub fn create_app_with_config<E: Engine>(
    service: ValidationService<E>,
    config: ServerConfig,
) -> Router {
    info!(
        fhir_version = %service.version(),
        workers = service.workers(),
        "Creating validator HTTP API"
    );

    // Create application state
    let state = AppState::new(Arc::new(service), config.clone());

    // Build the router with all validator routes
    let router = routing::validator_routes::create_routes(state);

    // Build middleware stack
    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(config.request_timeout),
        ));

    let router = router.layer(DefaultBodyLimit::max(config.max_body_size));

    // Add CORS if enabled
    let router = if config.enable_cors {
        let cors = build_cors_layer(&config);
        router.layer(cors)
    } else {
        router
    };

    // Apply remaining middleware
    router.layer(service_builder)
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    // Configure origins
    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    // Configure methods
    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    // Configure headers
    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup. `RUST_LOG` overrides
/// the level.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "helios_validator={level},helios_validator_rest={level},helios_hfv={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
