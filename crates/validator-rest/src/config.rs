//! Server configuration for the validator HTTP API.
//!
//! The server options wrap the validator options, so one command line (or
//! one environment) configures both the listener and the engine.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HFV_SERVER_PORT` | 8080 | Server port |
//! | `HFV_SERVER_HOST` | 127.0.0.1 | Host to bind |
//! | `HFV_LOG_LEVEL` | info | Log level |
//! | `HFV_MAX_BODY_SIZE` | 10485760 | Max request body (bytes) |
//! | `HFV_REQUEST_TIMEOUT` | 120 | Request timeout (seconds) |
//! | `HFV_ENABLE_CORS` | true | Enable CORS |
//! | `HFV_CORS_ORIGINS` | * | Allowed origins |
//! | `HFV_CORS_METHODS` | GET,POST,OPTIONS | Allowed methods |
//! | `HFV_CORS_HEADERS` | Content-Type,Accept | Allowed headers |
//! | `HFV_WORKERS` | available CPUs | Validation worker threads |
//!
//! Validator options use the `VALIDATOR_*` variables documented on
//! [`ValidatorConfig`].
//!
//! # Example
//!
//! ```rust
//! use helios_validator_rest::ServerConfig;
//!
//! let config = ServerConfig {
//!     port: 3000,
//!     workers: 2,
//!     ..Default::default()
//! };
//! assert_eq!(config.socket_addr(), "127.0.0.1:3000");
//! ```

use clap::Parser;
use helios_validator::ValidatorConfig;

/// Server configuration for the validator HTTP API.
#[derive(Debug, Clone, Parser)]
#[command(name = "hfv")]
#[command(about = "Helios FHIR Validator server")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "HFV_SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "HFV_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "HFV_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Maximum request body size in bytes.
    #[arg(long, env = "HFV_MAX_BODY_SIZE", default_value = "10485760")]
    pub max_body_size: usize,

    /// Request timeout in seconds.
    #[arg(long, env = "HFV_REQUEST_TIMEOUT", default_value = "120")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "HFV_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "HFV_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(long, env = "HFV_CORS_METHODS", default_value = "GET,POST,OPTIONS")]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(long, env = "HFV_CORS_HEADERS", default_value = "Content-Type,Accept")]
    pub cors_headers: String,

    /// Number of validation worker threads.
    #[arg(long, env = "HFV_WORKERS", default_value_t = default_workers())]
    pub workers: usize,

    /// Validator options.
    #[command(flatten)]
    pub validator: ValidatorConfig,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            max_body_size: 10 * 1024 * 1024, // 10MB
            request_timeout: 120,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "GET,POST,OPTIONS".to_string(),
            cors_headers: "Content-Type,Accept".to_string(),
            workers: default_workers(),
            validator: ValidatorConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a new ServerConfig from environment variables.
    ///
    /// Falls back to defaults if the environment cannot be parsed.
    pub fn from_env() -> Self {
        Self::try_parse_from(["hfv"]).unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.max_body_size == 0 {
            errors.push("Max body size cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.workers == 0 {
            errors.push("Worker count cannot be 0".to_string());
        }

        if let Err(validator_errors) = self.validator.validate() {
            errors.extend(validator_errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// Uses ephemeral port 0, two workers and no CORS.
    pub fn for_testing() -> Self {
        Self {
            port: 0, // Let OS assign port
            host: "127.0.0.1".to_string(),
            log_level: "debug".to_string(),
            max_body_size: 10 * 1024 * 1024,
            request_timeout: 30,
            enable_cors: false,
            cors_origins: "*".to_string(),
            cors_methods: "*".to_string(),
            cors_headers: "*".to_string(),
            workers: 2,
            validator: ValidatorConfig::default(),
        }
    }
}
