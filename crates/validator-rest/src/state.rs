//! Application state for the validator HTTP API.

use std::sync::Arc;

use helios_validator::{Engine, ValidationService};

use crate::config::ServerConfig;

/// Shared application state for the HTTP API.
///
/// Holds the validation service (worker pool plus engine prototype) and the
/// server configuration.
///
/// # Type Parameters
///
/// * `E` - The validation engine type
pub struct AppState<E: Engine> {
    /// The validation service.
    service: Arc<ValidationService<E>>,

    /// Server configuration.
    config: Arc<ServerConfig>,
}

// Manually implement Clone since E is wrapped in Arc and doesn't need to be Clone
impl<E: Engine> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            config: Arc::clone(&self.config),
        }
    }
}

impl<E: Engine> AppState<E> {
    /// Creates a new AppState with the given service and configuration.
    pub fn new(service: Arc<ValidationService<E>>, config: ServerConfig) -> Self {
        Self {
            service,
            config: Arc::new(config),
        }
    }

    /// Returns a reference to the validation service.
    pub fn service(&self) -> &ValidationService<E> {
        &self.service
    }

    /// Returns a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
