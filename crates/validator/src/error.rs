//! Error types for the validation core.
//!
//! Errors are split by who can fix them:
//!
//! | Error | Raised by | Meaning |
//! |-------|-----------|---------|
//! | [`BundleError`] | bundle orchestration | Structural violation in a request bundle (caller error) |
//! | [`ValidatorError`] | every request-level operation | Caller errors and server faults |
//! | [`EngineFault`] | the engine contract | Recoverable outcome or unexpected internal fault |
//! | [`StartupError`] | engine preparation | The prototype could not be prepared; fatal |
//! | [`PoolError`] | the worker pool | The pool is closed or a worker died mid-job |
//!
//! Internal engine faults never leave the single-resource boundary as errors:
//! the validator converts them into a FATAL diagnostic outcome.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::path::PathBuf;

use thiserror::Error;

use crate::outcome::OperationOutcome;

/// Structural violations found while scanning a request bundle.
///
/// Every variant is detected before any entry reaches the engine, and each
/// one aborts the whole request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BundleError {
    /// The request body is not a JSON object.
    #[error("Bundle must be a JSON object: {reason}")]
    MalformedInput { reason: String },

    /// `resourceType` is missing or not `Bundle`.
    #[error("Bundle.resourceType must be 'Bundle', got '{found}'")]
    InvalidResourceType { found: String },

    /// `type` is missing, not a primitive, or not an accepted batch type.
    #[error(
        "Bundle.type must be one of [{}], got '{}'",
        .accepted.join(", "),
        .found.as_deref().unwrap_or("<missing>")
    )]
    InvalidBundleType {
        found: Option<String>,
        accepted: Vec<String>,
    },

    /// `entry` is present but is not an array.
    #[error("Bundle.entry must be a JSON array")]
    InvalidEntryList,

    /// An element of `entry` is not an object.
    #[error("Bundle.entry[{index}] must be a JSON object")]
    InvalidEntryShape { index: usize },

    /// An entry has no `resource`, or it is not an object.
    #[error("Bundle.entry[{index}].resource must be a JSON object")]
    MissingEntryResource { index: usize },

    /// An entry's `fullUrl` is present but not a string.
    #[error("Bundle.entry[{index}].fullUrl must be a string")]
    InvalidFullUrl { index: usize },

    /// An entry repeats a `fullUrl` used by an earlier entry.
    #[error("Bundle.entry[{index}].fullUrl must be unique ('{full_url}' already used)")]
    DuplicateFullUrl { index: usize, full_url: String },
}

/// Request-level errors of the validation core.
#[derive(Error, Debug)]
pub enum ValidatorError {
    /// The configured FHIR version is not R4 or R5.
    #[error("Unsupported FHIR version: {version}")]
    UnsupportedVersion { version: String },

    /// The request bundle is structurally invalid.
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// The engine prototype was never installed (startup failed).
    #[error("validation engine is not ready: the engine prototype was never initialized")]
    EngineNotReady,

    /// The prototype exists but a worker instance could not be cloned from it.
    #[error("validation engine could not be cloned for this worker: {message}")]
    EngineUnavailable { message: String },

    /// Output could not be serialized.
    #[error("failed to serialize validation output: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The worker pool could not run the job.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl ValidatorError {
    /// Returns true when the caller can fix the request (4xx class).
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ValidatorError::UnsupportedVersion { .. } | ValidatorError::Bundle(_)
        )
    }

    /// Returns true when the engine cannot serve requests at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ValidatorError::EngineNotReady | ValidatorError::Pool(_)
        )
    }
}

/// Faults raised by an engine instance while validating one resource.
#[derive(Error, Debug)]
pub enum EngineFault {
    /// The engine could not process the resource and produced a structured
    /// outcome describing why. Treated as a normal validation result.
    #[error("engine returned a structured outcome with {} issue(s)", .0.issues.len())]
    Outcome(OperationOutcome),

    /// Anything else. Contained per resource and converted to a FATAL issue.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Fatal errors raised while preparing the engine prototype.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Unsupported FHIR version: {version}")]
    UnsupportedVersion { version: String },

    #[error("implementation guide '{reference}' could not be resolved: {reason}")]
    PackageNotFound { reference: String, reason: String },

    #[error("failed to read package content from {}: {source}", .path.display())]
    PackageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in package file {}: {source}", .path.display())]
    PackageJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot open terminology log {}: {source}", .path.display())]
    TerminologyLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the engine prototype has already been initialized")]
    AlreadyInitialized,
}

/// Errors raised by the worker pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("validation worker pool is shut down")]
    Closed,

    #[error("validation worker terminated before completing the job")]
    WorkerLost,
}

/// Result type alias for validation operations.
pub type ValidatorResult<T> = Result<T, ValidatorError>;
