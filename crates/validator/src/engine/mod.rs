//! The validation engine contract.
//!
//! Engines come in two parts:
//!
//! - [`Engine`] is the prototype. It is prepared once at startup by an
//!   [`EngineFactory`], holds the loaded specification packages,
//!   implementation guides and terminology configuration, and is shared
//!   read-only across workers.
//! - [`EngineInstance`] is a worker-local clone produced by [`Engine::fork`].
//!   It shares the prototype's loaded context but owns its own mutable
//!   validation state, so it is `Send` but deliberately not `Sync`.
//!
//! The crate ships one implementation, [`StructuralEngine`], used when no
//! external rule engine is wired in.

mod resource_types;
mod structural;

use std::fmt;

pub use resource_types::{is_valid_resource_type, resource_type_names};
pub use structural::{StructuralEngine, StructuralEngineFactory, StructuralInstance};

use crate::config::ValidatorConfig;
use crate::error::{EngineFault, StartupError};
use crate::message::ValidationMessage;
use crate::version::FhirVersion;

/// Serialization format of a submitted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceFormat {
    /// FHIR JSON.
    #[default]
    Json,
    /// FHIR XML.
    Xml,
}

impl ResourceFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ResourceFormat::Json => "application/fhir+json",
            ResourceFormat::Xml => "application/fhir+xml",
        }
    }
}

impl fmt::Display for ResourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceFormat::Json => f.write_str("json"),
            ResourceFormat::Xml => f.write_str("xml"),
        }
    }
}

/// Prepares engine prototypes.
pub trait EngineFactory {
    /// The prototype type produced.
    type Engine: Engine;

    /// Loads the core package for `version`, the configured implementation
    /// guides and the terminology configuration. Expensive; called once.
    fn prepare(
        &self,
        version: FhirVersion,
        config: &ValidatorConfig,
    ) -> Result<Self::Engine, StartupError>;
}

/// A prepared, read-only engine prototype.
pub trait Engine: Send + Sync + 'static {
    /// The worker-local instance type.
    type Instance: EngineInstance;

    /// Produces a new instance sharing this prototype's loaded context with
    /// independent mutable validation state.
    fn fork(&self) -> anyhow::Result<Self::Instance>;

    /// Returns the `name#version` references of every loaded package.
    fn loaded_packages(&self) -> Vec<String>;

    /// Returns the engine's version string.
    fn engine_version(&self) -> &str;
}

/// A worker-confined engine instance.
pub trait EngineInstance: Send + 'static {
    /// Validates one resource.
    ///
    /// Returns the raw, unsorted messages. A resource the engine cannot
    /// process at all may be reported as [`EngineFault::Outcome`]; anything
    /// unexpected is [`EngineFault::Internal`].
    fn validate(
        &mut self,
        bytes: &[u8],
        format: ResourceFormat,
        profiles: &[String],
    ) -> Result<Vec<ValidationMessage>, EngineFault>;
}
