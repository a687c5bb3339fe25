//! # Helios Validator
//!
//! Request-to-engine orchestration for FHIR resource and bundle validation.
//!
//! The crate wraps a FHIR validation engine and exposes it as a request
//! processing core:
//!
//! - **Engine cache**: the expensive engine is prepared once as a prototype
//!   and each worker forks and keeps its own instance ([`cache`], [`pool`]).
//! - **Single-resource validation** with fault containment: any engine
//!   failure becomes a FATAL diagnostic, never a crash ([`validator`]).
//! - **Bundle orchestration**: structural checks on the whole request
//!   bundle, then independent per-entry validation into a `batch-response`
//!   bundle ([`bundle`]).
//! - **Outcome composition**: deterministic, deduplicated outcomes
//!   ([`outcome`]) rendered per FHIR version ([`format`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use helios_validator::{
//!     EngineFactory, EnginePrototype, ResourceFormat, StructuralEngineFactory, ValidationPool,
//!     ValidationService, ValidatorConfig,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ValidatorConfig::default();
//! let engine = StructuralEngineFactory.prepare(config.fhir_version()?, &config)?;
//! let pool = ValidationPool::new(Arc::new(EnginePrototype::ready(engine)), 4)?;
//! let service = ValidationService::new(pool, config)?;
//!
//! let result = service
//!     .validate(br#"{"resourceType":"Patient"}"#.to_vec(), ResourceFormat::Json, vec![])
//!     .await?;
//! assert!(!result.has_error());
//! # Ok(())
//! # }
//! ```

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bundle;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod info;
pub mod message;
pub mod outcome;
pub mod pool;
pub mod service;
pub mod validator;
pub mod version;

pub use bundle::{
    BundleResponseEntry, BundleValidation, RequestBundle, RequestEntry, parse_request_bundle,
    validate_bundle,
};
pub use cache::{EnginePrototype, WorkerEngineCache};
pub use config::{BestPracticeLevel, OutputOptions, SeverityLevel, ValidatorConfig};
pub use engine::{
    Engine, EngineFactory, EngineInstance, ResourceFormat, StructuralEngine,
    StructuralEngineFactory, StructuralInstance,
};
pub use error::{
    BundleError, EngineFault, PoolError, StartupError, ValidatorError, ValidatorResult,
};
pub use format::{FormatAdapter, R4Adapter, R5Adapter, adapter_for};
pub use info::ApplicationInfo;
pub use message::{IssueSeverity, IssueType, ValidationMessage};
pub use outcome::{ALL_OK, Composed, OperationOutcome, OutcomeIssue, compose};
pub use pool::ValidationPool;
pub use service::ValidationService;
pub use validator::{ValidationResult, normalize_profiles, validate_resource};
pub use version::FhirVersion;
