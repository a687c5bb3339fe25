//! Engines and services for tests.
//!
//! [`ScriptedEngine`] wraps the structural engine and injects faults based on
//! the resource `id`:
//!
//! | id | Behaviour |
//! |----|-----------|
//! | `explode` | panics inside `validate` |
//! | `fail` | returns an internal fault |
//! | `unprocessable` | returns a structured outcome fault |
//! | `success-code` | returns an outcome using the R5-only `success` code |
//! | `empty-outcome` | returns a structured outcome fault with no issues |

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use serde_json::Value;
use uuid::Uuid;

use helios_validator::{
    Engine, EngineFactory, EngineFault, EngineInstance, EnginePrototype, IssueSeverity, IssueType,
    OperationOutcome, OutcomeIssue, ResourceFormat, StructuralEngine, StructuralEngineFactory,
    StructuralInstance, ValidationMessage, ValidationPool, ValidationService, ValidatorConfig,
    WorkerEngineCache,
};

/// Structural engine with fault injection and call counting.
pub struct ScriptedEngine {
    inner: StructuralEngine,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    /// Prepares the engine for `config`.
    pub fn new(config: &ValidatorConfig) -> Self {
        let version = config.fhir_version().expect("supported version");
        let inner = StructuralEngineFactory
            .prepare(version, config)
            .expect("engine prepares");
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns a counter of `validate` calls across all instances.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Engine for ScriptedEngine {
    type Instance = ScriptedInstance;

    fn fork(&self) -> anyhow::Result<ScriptedInstance> {
        Ok(ScriptedInstance {
            inner: self.inner.fork()?,
            calls: Arc::clone(&self.calls),
        })
    }

    fn loaded_packages(&self) -> Vec<String> {
        self.inner.loaded_packages()
    }

    fn engine_version(&self) -> &str {
        "scripted-test-engine"
    }
}

/// Instance of [`ScriptedEngine`].
pub struct ScriptedInstance {
    inner: StructuralInstance,
    calls: Arc<AtomicUsize>,
}

impl ScriptedInstance {
    /// Returns the session id of the wrapped instance.
    pub fn session_id(&self) -> Uuid {
        self.inner.session_id()
    }
}

impl EngineInstance for ScriptedInstance {
    fn validate(
        &mut self,
        bytes: &[u8],
        format: ResourceFormat,
        profiles: &[String],
    ) -> Result<Vec<ValidationMessage>, EngineFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let id = serde_json::from_slice::<Value>(bytes)
            .ok()
            .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string));

        match id.as_deref() {
            Some("explode") => panic!("engine state corrupted"),
            Some("fail") => Err(EngineFault::Internal(anyhow!(
                "terminology server unreachable"
            ))),
            Some("unprocessable") => Err(EngineFault::Outcome(OperationOutcome::with_issues(
                vec![OutcomeIssue::new(
                    IssueSeverity::Error,
                    IssueType::Processing,
                    "Resource could not be processed",
                )
                .with_expression("Patient")],
            ))),
            Some("success-code") => Err(EngineFault::Outcome(OperationOutcome::with_issues(
                vec![OutcomeIssue::new(
                    IssueSeverity::Information,
                    IssueType::Success,
                    "Validation successful",
                )],
            ))),
            Some("empty-outcome") => Err(EngineFault::Outcome(OperationOutcome::with_issues(
                vec![],
            ))),
            _ => self.inner.validate(bytes, format, profiles),
        }
    }
}

/// Builds a worker cache over a ready scripted engine.
pub fn scripted_cache(config: &ValidatorConfig) -> WorkerEngineCache<ScriptedEngine> {
    let prototype = Arc::new(EnginePrototype::ready(ScriptedEngine::new(config)));
    WorkerEngineCache::new(0, prototype)
}

/// Builds a scripted service and returns it with the engine's call counter.
pub fn scripted_service(
    config: ValidatorConfig,
    workers: usize,
) -> (ValidationService<ScriptedEngine>, Arc<AtomicUsize>) {
    let engine = ScriptedEngine::new(&config);
    let calls = engine.calls();
    let pool = ValidationPool::new(Arc::new(EnginePrototype::ready(engine)), workers)
        .expect("pool starts");
    let service = ValidationService::new(pool, config).expect("service builds");
    (service, calls)
}

/// Builds a service over the structural engine.
pub fn structural_service(config: ValidatorConfig) -> ValidationService<StructuralEngine> {
    let engine = StructuralEngineFactory
        .prepare(config.fhir_version().expect("supported version"), &config)
        .expect("engine prepares");
    let pool = ValidationPool::new(Arc::new(EnginePrototype::ready(engine)), 2).expect("pool starts");
    ValidationService::new(pool, config).expect("service builds")
}

/// Builds a service whose engine prototype was never installed.
pub fn unready_service() -> ValidationService<StructuralEngine> {
    let pool = ValidationPool::new(Arc::new(EnginePrototype::new()), 1).expect("pool starts");
    ValidationService::new(pool, ValidatorConfig::default()).expect("service builds")
}
