//! Helios FHIR Validator (HFV)
//!
//! Validates FHIR R4/R5 resources and batch bundles over HTTP.

use std::sync::Arc;

use clap::Parser;
use helios_validator::{
    EngineFactory, EnginePrototype, StructuralEngineFactory, ValidationPool, ValidationService,
};
use helios_validator_rest::{ServerConfig, create_app_with_config, init_logging};
use tracing::info;

/// Starts the Axum HTTP server.
async fn serve(app: axum::Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        port = config.port,
        host = %config.host,
        workers = config.workers,
        fhir_version = %config.validator.version_string(),
        "Starting Helios FHIR Validator"
    );
    for property in config.validator.all_properties() {
        info!("  {}", property);
    }

    // A failed preparation aborts startup before the listener is bound.
    let version = config.validator.fhir_version()?;
    let prototype = Arc::new(EnginePrototype::new());
    let engine = StructuralEngineFactory.prepare(version, &config.validator)?;
    prototype.install(engine)?;

    let pool = ValidationPool::new(prototype, config.workers)?;
    let service = ValidationService::new(pool, config.validator.clone())?;

    let app = create_app_with_config(service, config.clone());
    serve(app, &config).await
}
