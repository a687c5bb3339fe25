//! FHIR major versions supported by the validator.
//!
//! The service is configured with a single FHIR version string (for example
//! `4.0.1` or `5.0`). Only the R4 and R5 families are supported; everything
//! else is rejected with [`ValidatorError::UnsupportedVersion`].

use std::fmt;

use serde::Serialize;

use crate::error::ValidatorError;

/// A supported FHIR major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FhirVersion {
    /// FHIR R4 (4.0.x).
    R4,
    /// FHIR R5 (5.0.x).
    R5,
}

impl FhirVersion {
    /// Resolves a configured version string to a supported major version.
    ///
    /// Accepts full versions (`4.0.1`), major.minor (`4.0`) and release
    /// names (`R4`, `r5`). R4B (`4.3.x`) is not an R4 version.
    pub fn parse(version: &str) -> Result<Self, ValidatorError> {
        let trimmed = version.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "R4" => return Ok(FhirVersion::R4),
            "R5" => return Ok(FhirVersion::R5),
            _ => {}
        }

        if trimmed == "4.0" || trimmed.starts_with("4.0.") || trimmed.starts_with("4.0-") {
            Ok(FhirVersion::R4)
        } else if trimmed == "5.0" || trimmed.starts_with("5.0.") || trimmed.starts_with("5.0-") {
            Ok(FhirVersion::R5)
        } else {
            Err(ValidatorError::UnsupportedVersion {
                version: version.to_string(),
            })
        }
    }

    /// Returns the published version of the core specification.
    pub fn full_version(&self) -> &'static str {
        match self {
            FhirVersion::R4 => "4.0.1",
            FhirVersion::R5 => "5.0.0",
        }
    }

    /// Returns the package id of the core specification package.
    pub fn core_package_id(&self) -> &'static str {
        match self {
            FhirVersion::R4 => "hl7.fhir.r4.core",
            FhirVersion::R5 => "hl7.fhir.r5.core",
        }
    }

    /// Returns the `name#version` reference of the core package.
    pub fn core_package(&self) -> String {
        format!("{}#{}", self.core_package_id(), self.full_version())
    }

    /// Returns the short release name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FhirVersion::R4 => "R4",
            FhirVersion::R5 => "R5",
        }
    }
}

impl fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
