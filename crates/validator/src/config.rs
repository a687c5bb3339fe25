//! Validator configuration.
//!
//! [`ValidatorConfig`] carries every option that shapes validation: the FHIR
//! version, implementation guides, terminology settings and the engine
//! policy switches. It is a `clap::Args` group so the server binary can
//! flatten it into its own command line, and every option can also be set
//! through the environment.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `VALIDATOR_SV` | 4.0.1 | FHIR version |
//! | `VALIDATOR_IG` | | Implementation guides (comma-separated) |
//! | `VALIDATOR_TX_SERVER` | | Terminology server URL |
//! | `VALIDATOR_TX_LOG` | | Terminology log file |
//! | `VALIDATOR_REMOVE_TEXT` | false | Strip OperationOutcome narrative |
//! | `VALIDATOR_ANY_EXTENSIONS` | false | Allow any extension |
//! | `VALIDATOR_EXTENSION_DOMAINS` | | Allowed extension domains |
//! | `VALIDATOR_UNKNOWN_CODESYSTEMS_ERRORS` | false | Unknown code systems are errors |
//! | `VALIDATOR_ALLOW_EXAMPLE_URLS` | false | Allow example.org references |
//! | `VALIDATOR_DISPLAY_WARNINGS` | false | Wrong displays are warnings |
//! | `VALIDATOR_INVARIANT_IN_MESSAGE` | false | Include FHIRPath of invariants |
//! | `VALIDATOR_LEVEL` | warnings | Minimum reported level (hints, warnings, errors) |
//! | `VALIDATOR_BEST_PRACTICE` | warning | Best practice level (hint, warning, error, ignore) |
//! | `VALIDATOR_VERBOSE` | false | Explain which profiles were checked |
//! | `VALIDATOR_SHOW_TIMES` | false | Report validation timings |
//! | `VALIDATOR_BUNDLE_TYPES` | batch | Accepted request bundle types |
//! | `VALIDATOR_PACKAGE_CACHE` | ~/.fhir/packages | Local FHIR package cache |

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use serde::Serialize;

use crate::error::ValidatorError;
use crate::message::IssueSeverity;
use crate::version::FhirVersion;

/// Bundle types a request bundle may declare.
pub const SUPPORTED_BUNDLE_TYPES: &[&str] = &["batch", "transaction"];

/// Minimum severity of messages reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    /// Report hints, warnings and errors.
    Hints,
    /// Report warnings and errors.
    #[default]
    Warnings,
    /// Report errors only.
    Errors,
}

impl SeverityLevel {
    /// Returns true if a message of this severity should be reported.
    pub fn reports(&self, severity: IssueSeverity) -> bool {
        match self {
            SeverityLevel::Hints => true,
            SeverityLevel::Warnings => severity != IssueSeverity::Information,
            SeverityLevel::Errors => severity.is_error(),
        }
    }
}

/// How best practice recommendations are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BestPracticeLevel {
    /// Report as information.
    Hint,
    /// Report as warning.
    #[default]
    Warning,
    /// Report as error.
    Error,
    /// Do not report.
    Ignore,
}

impl BestPracticeLevel {
    /// Returns the severity to report at, or `None` when ignored.
    pub fn severity(&self) -> Option<IssueSeverity> {
        match self {
            BestPracticeLevel::Hint => Some(IssueSeverity::Information),
            BestPracticeLevel::Warning => Some(IssueSeverity::Warning),
            BestPracticeLevel::Error => Some(IssueSeverity::Error),
            BestPracticeLevel::Ignore => None,
        }
    }
}

/// Options that shape how outcomes are rendered, independent of validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Strip `OperationOutcome.text` before serialization.
    pub remove_narrative_text: bool,
}

/// Configuration of the validation engine and orchestration.
#[derive(Debug, Clone, Args, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorConfig {
    /// FHIR version to validate against (4.0.x or 5.0.x).
    #[arg(long = "sv", env = "VALIDATOR_SV", default_value = "4.0.1")]
    pub version: String,

    /// Implementation guides to load: package ids (`name#version`) or local paths.
    #[arg(long = "ig", env = "VALIDATOR_IG", value_delimiter = ',')]
    pub implementation_guides: Vec<String>,

    /// Terminology server URL.
    #[arg(long = "tx-server", env = "VALIDATOR_TX_SERVER")]
    pub terminology_server: Option<String>,

    /// Terminology log file.
    #[arg(long = "tx-log", env = "VALIDATOR_TX_LOG")]
    pub terminology_log: Option<PathBuf>,

    /// Remove OperationOutcome narrative text from results.
    #[arg(long, env = "VALIDATOR_REMOVE_TEXT", default_value = "false")]
    pub remove_narrative_text: bool,

    /// Allow all unknown extensions.
    #[arg(long, env = "VALIDATOR_ANY_EXTENSIONS", default_value = "false")]
    pub any_extensions_allowed: bool,

    /// Extension domains to allow (comma-separated URL prefixes).
    #[arg(
        long = "extension-domain",
        env = "VALIDATOR_EXTENSION_DOMAINS",
        value_delimiter = ','
    )]
    pub allowed_extension_domains: Vec<String>,

    /// Unknown code systems cause errors instead of warnings.
    #[arg(long, env = "VALIDATOR_UNKNOWN_CODESYSTEMS_ERRORS", default_value = "false")]
    pub unknown_code_systems_cause_errors: bool,

    /// Allow references to example.org.
    #[arg(long, env = "VALIDATOR_ALLOW_EXAMPLE_URLS", default_value = "false")]
    pub allow_example_urls: bool,

    /// Report display mismatches as warnings instead of errors.
    #[arg(long, env = "VALIDATOR_DISPLAY_WARNINGS", default_value = "false")]
    pub display_warnings: bool,

    /// Include the FHIRPath expression of failed invariants in messages.
    #[arg(long, env = "VALIDATOR_INVARIANT_IN_MESSAGE", default_value = "false")]
    pub include_invariant_path_in_message: bool,

    /// Minimum level of reported messages.
    #[arg(long = "level", env = "VALIDATOR_LEVEL", value_enum, default_value = "warnings")]
    pub minimum_severity_level: SeverityLevel,

    /// Severity of best practice recommendations.
    #[arg(long, env = "VALIDATOR_BEST_PRACTICE", value_enum, default_value = "warning")]
    pub best_practice_level: BestPracticeLevel,

    /// Report which profiles each resource was checked against.
    #[arg(long, env = "VALIDATOR_VERBOSE", default_value = "false")]
    pub verbose: bool,

    /// Report validation timings.
    #[arg(long, env = "VALIDATOR_SHOW_TIMES", default_value = "false")]
    pub show_times: bool,

    /// Bundle types accepted by bundle validation (batch, transaction).
    #[arg(
        long = "bundle-type",
        env = "VALIDATOR_BUNDLE_TYPES",
        value_delimiter = ',',
        default_value = "batch"
    )]
    pub accepted_bundle_types: Vec<String>,

    /// Local FHIR package cache used to resolve implementation guides.
    #[arg(long, env = "VALIDATOR_PACKAGE_CACHE")]
    pub package_cache_dir: Option<PathBuf>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            version: "4.0.1".to_string(),
            implementation_guides: Vec::new(),
            terminology_server: None,
            terminology_log: None,
            remove_narrative_text: false,
            any_extensions_allowed: false,
            allowed_extension_domains: Vec::new(),
            unknown_code_systems_cause_errors: false,
            allow_example_urls: false,
            display_warnings: false,
            include_invariant_path_in_message: false,
            minimum_severity_level: SeverityLevel::Warnings,
            best_practice_level: BestPracticeLevel::Warning,
            verbose: false,
            show_times: false,
            accepted_bundle_types: vec!["batch".to_string()],
            package_cache_dir: None,
        }
    }
}

impl ValidatorConfig {
    /// Returns the configured version string, defaulting blank values to 4.0.1.
    pub fn version_string(&self) -> &str {
        let version = self.version.trim();
        if version.is_empty() { "4.0.1" } else { version }
    }

    /// Resolves the configured version to a supported major version.
    pub fn fhir_version(&self) -> Result<FhirVersion, ValidatorError> {
        FhirVersion::parse(self.version_string())
    }

    /// Returns the core package reference, e.g. `hl7.fhir.r4.core#4.0.1`.
    pub fn core_package(&self) -> Result<String, ValidatorError> {
        Ok(self.fhir_version()?.core_package())
    }

    /// Returns the terminology server URL; blank values count as unset.
    pub fn terminology_server(&self) -> Option<&str> {
        self.terminology_server
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the terminology log path; empty paths count as unset.
    pub fn terminology_log(&self) -> Option<&PathBuf> {
        self.terminology_log
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Returns the non-blank implementation guide references.
    pub fn implementation_guides(&self) -> Vec<&str> {
        self.implementation_guides
            .iter()
            .map(|ig| ig.trim())
            .filter(|ig| !ig.is_empty())
            .collect()
    }

    /// Returns the local package cache directory.
    pub fn package_cache_dir(&self) -> PathBuf {
        self.package_cache_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".fhir")
                .join("packages")
        })
    }

    /// Returns the normalized accepted bundle types.
    pub fn accepted_bundle_types(&self) -> Vec<String> {
        let types: Vec<String> = self
            .accepted_bundle_types
            .iter()
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if types.is_empty() {
            vec!["batch".to_string()]
        } else {
            types
        }
    }

    /// Returns the rendering options.
    pub fn output_options(&self) -> OutputOptions {
        OutputOptions {
            remove_narrative_text: self.remove_narrative_text,
        }
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.fhir_version() {
            errors.push(e.to_string());
        }

        for bundle_type in self.accepted_bundle_types() {
            if !SUPPORTED_BUNDLE_TYPES.contains(&bundle_type.as_str()) {
                errors.push(format!(
                    "Unsupported bundle type '{}' (expected one of: {})",
                    bundle_type,
                    SUPPORTED_BUNDLE_TYPES.join(", ")
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Returns all properties of the configuration in display form.
    pub fn all_properties(&self) -> Vec<String> {
        vec![
            format!("FHIR Version: {}", self.version_string()),
            format!("Implementation Guides: {:?}", self.implementation_guides()),
            format!(
                "Terminology Server URL: {}",
                self.terminology_server().unwrap_or("none")
            ),
            format!(
                "Terminology Server Log: {}",
                self.terminology_log()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "none".to_string())
            ),
            format!("Remove OperationOutcome Text: {}", self.remove_narrative_text),
            format!("Allow Any Extensions: {}", self.any_extensions_allowed),
            format!("Allowed Extension Domains: {:?}", self.allowed_extension_domains),
            format!(
                "Unknown Code Systems Cause Errors: {}",
                self.unknown_code_systems_cause_errors
            ),
            format!("Allow Example URLs: {}", self.allow_example_urls),
            format!("Display Warnings Instead of Errors: {}", self.display_warnings),
            format!(
                "Include FHIRPath in Invariant Messages: {}",
                self.include_invariant_path_in_message
            ),
            format!("Validation Level: {:?}", self.minimum_severity_level),
            format!("Best Practice Level: {:?}", self.best_practice_level),
            format!("Verbose Output: {}", self.verbose),
            format!("Show Processing Times: {}", self.show_times),
            format!("Accepted Bundle Types: {:?}", self.accepted_bundle_types()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ValidatorConfig::default();
        assert_eq!(config.fhir_version().unwrap(), FhirVersion::R4);
        assert_eq!(config.core_package().unwrap(), "hl7.fhir.r4.core#4.0.1");
        assert_eq!(config.accepted_bundle_types(), vec!["batch"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_version_defaults_to_r4() {
        let config = ValidatorConfig {
            version: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.fhir_version().unwrap(), FhirVersion::R4);
    }

    #[test]
    fn test_validate_rejects_unsupported_version_and_bundle_type() {
        let config = ValidatorConfig {
            version: "3.0.2".to_string(),
            accepted_bundle_types: vec!["batch".to_string(), "collection".to_string()],
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("3.0.2")));
        assert!(errors.iter().any(|e| e.contains("collection")));
    }

    #[test]
    fn test_blank_optional_settings_are_unset() {
        let config = ValidatorConfig {
            terminology_server: Some("   ".to_string()),
            terminology_log: Some(PathBuf::new()),
            implementation_guides: vec![" ".to_string(), "hl7.fhir.il.core#0.17.0".to_string()],
            ..Default::default()
        };
        assert!(config.terminology_server().is_none());
        assert!(config.terminology_log().is_none());
        assert_eq!(config.implementation_guides(), vec!["hl7.fhir.il.core#0.17.0"]);
    }

    #[test]
    fn test_bundle_types_are_normalized() {
        let config = ValidatorConfig {
            accepted_bundle_types: vec![" Batch ".to_string(), "TRANSACTION".to_string()],
            ..Default::default()
        };
        assert_eq!(config.accepted_bundle_types(), vec!["batch", "transaction"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_severity_level_filter() {
        assert!(SeverityLevel::Hints.reports(IssueSeverity::Information));
        assert!(!SeverityLevel::Warnings.reports(IssueSeverity::Information));
        assert!(SeverityLevel::Warnings.reports(IssueSeverity::Warning));
        assert!(!SeverityLevel::Errors.reports(IssueSeverity::Warning));
        assert!(SeverityLevel::Errors.reports(IssueSeverity::Fatal));
    }

    #[test]
    fn test_best_practice_severity() {
        assert_eq!(BestPracticeLevel::Ignore.severity(), None);
        assert_eq!(
            BestPracticeLevel::Error.severity(),
            Some(IssueSeverity::Error)
        );
    }

    #[test]
    fn test_all_properties_lists_every_option() {
        let properties = ValidatorConfig::default().all_properties();
        assert_eq!(properties.len(), 16);
        assert_eq!(properties[0], "FHIR Version: 4.0.1");
    }
}
