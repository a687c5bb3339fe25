//! Descriptive information about the running validator.

use serde::Serialize;

use crate::config::ValidatorConfig;
use crate::engine::Engine;

/// Application, engine and configuration details.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInfo {
    /// Version of the service.
    pub app_version: String,
    /// Version of the validation engine.
    pub engine_version: String,
    /// Configured FHIR version.
    pub fhir_version: String,
    /// Configured implementation guides.
    pub implementation_guides: Vec<String>,
    /// Packages loaded into the engine, sorted.
    pub loaded_packages: Vec<String>,
    /// Terminology server, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminology_server: Option<String>,
    /// Local package cache directory.
    pub package_cache_dir: String,
    /// Configuration in display form.
    pub properties: Vec<String>,
}

impl ApplicationInfo {
    /// Collects the info for a prepared engine.
    pub fn collect<E: Engine>(app_version: &str, engine: &E, config: &ValidatorConfig) -> Self {
        let mut loaded_packages = engine.loaded_packages();
        loaded_packages.sort();

        Self {
            app_version: app_version.to_string(),
            engine_version: engine.engine_version().to_string(),
            fhir_version: config.version_string().to_string(),
            implementation_guides: config
                .implementation_guides()
                .into_iter()
                .map(str::to_string)
                .collect(),
            loaded_packages,
            terminology_server: config.terminology_server().map(str::to_string),
            package_cache_dir: config.package_cache_dir().display().to_string(),
            properties: config.all_properties(),
        }
    }
}
