//! The validation service.
//!
//! [`ValidationService`] binds the worker pool to the configured FHIR
//! version. The format adapter, output options and accepted bundle types
//! are resolved once at construction; every request then runs on a pool
//! worker against that worker's engine instance.

use tracing::debug;

use crate::bundle::{BundleValidation, validate_bundle};
use crate::config::{OutputOptions, ValidatorConfig};
use crate::engine::{Engine, ResourceFormat};
use crate::error::ValidatorResult;
use crate::format::{FormatAdapter, adapter_for};
use crate::info::ApplicationInfo;
use crate::pool::ValidationPool;
use crate::validator::{ValidationResult, validate_resource};
use crate::version::FhirVersion;

/// Validates resources and bundles on a pool of engine workers.
pub struct ValidationService<E: Engine> {
    pool: ValidationPool<E>,
    config: ValidatorConfig,
    version: FhirVersion,
    adapter: &'static dyn FormatAdapter,
    options: OutputOptions,
    accepted_bundle_types: Vec<String>,
}

impl<E: Engine> ValidationService<E> {
    /// Creates the service. Fails if the configured version is unsupported.
    pub fn new(pool: ValidationPool<E>, config: ValidatorConfig) -> ValidatorResult<Self> {
        let version = config.fhir_version()?;
        Ok(Self {
            pool,
            version,
            adapter: adapter_for(version),
            options: config.output_options(),
            accepted_bundle_types: config.accepted_bundle_types(),
            config,
        })
    }

    /// Validates one resource against the given profiles.
    pub async fn validate(
        &self,
        bytes: Vec<u8>,
        format: ResourceFormat,
        profiles: Vec<String>,
    ) -> ValidatorResult<ValidationResult> {
        debug!(bytes = bytes.len(), profiles = ?profiles, "Dispatching resource validation");
        let adapter = self.adapter;
        let options = self.options;
        self.pool
            .run(move |cache| validate_resource(cache, &bytes, format, &profiles, adapter, options))
            .await?
    }

    /// Validates a batch bundle.
    pub async fn validate_bundle(&self, bytes: Vec<u8>) -> ValidatorResult<BundleValidation> {
        debug!(bytes = bytes.len(), "Dispatching bundle validation");
        let adapter = self.adapter;
        let options = self.options;
        let accepted = self.accepted_bundle_types.clone();
        self.pool
            .run(move |cache| validate_bundle(cache, &bytes, adapter, options, &accepted))
            .await?
    }

    /// Returns application info, or `EngineNotReady` before startup completed.
    pub fn info(&self, app_version: &str) -> ValidatorResult<ApplicationInfo> {
        let engine = self.pool.prototype().get()?;
        Ok(ApplicationInfo::collect(app_version, engine.as_ref(), &self.config))
    }

    /// Returns true once the engine prototype is installed.
    pub fn is_ready(&self) -> bool {
        self.pool.prototype().is_ready()
    }

    /// Returns the active FHIR version.
    pub fn version(&self) -> FhirVersion {
        self.version
    }

    /// Returns the validator configuration.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Returns the number of pool workers.
    pub fn workers(&self) -> usize {
        self.pool.size()
    }
}
