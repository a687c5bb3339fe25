//! Engine prototype and per-worker engine cache.
//!
//! The [`EnginePrototype`] is prepared once at startup and installed into a
//! process-wide slot. Each worker owns one [`WorkerEngineCache`], which forks
//! an instance from the prototype the first time the worker needs one and
//! returns the same instance on every later call. Instances never leave the
//! worker that owns the cache, so engine state needs no locking.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tracing::{error, info, warn};

use crate::engine::Engine;
use crate::error::{StartupError, ValidatorError, ValidatorResult};

/// The process-wide engine prototype slot.
///
/// Empty until [`install`](Self::install) succeeds. Read-only afterwards.
pub struct EnginePrototype<E: Engine> {
    slot: OnceLock<Arc<E>>,
}

impl<E: Engine> EnginePrototype<E> {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Creates a slot holding `engine`.
    pub fn ready(engine: E) -> Self {
        let prototype = Self::new();
        let _ = prototype.slot.set(Arc::new(engine));
        prototype
    }

    /// Installs the prepared engine. Fails if one is already installed.
    pub fn install(&self, engine: E) -> Result<(), StartupError> {
        self.slot
            .set(Arc::new(engine))
            .map_err(|_| StartupError::AlreadyInitialized)
    }

    /// Returns the prototype, or `EngineNotReady` if none was installed.
    pub fn get(&self) -> ValidatorResult<Arc<E>> {
        self.slot.get().cloned().ok_or(ValidatorError::EngineNotReady)
    }

    /// Returns true once a prototype is installed.
    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl<E: Engine> Default for EnginePrototype<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// One worker's engine cache.
///
/// Owned by exactly one worker; `&mut self` on [`get`](Self::get) is what
/// confines the instance.
pub struct WorkerEngineCache<E: Engine> {
    worker: usize,
    prototype: Arc<EnginePrototype<E>>,
    instance: Option<E::Instance>,
    clones: u64,
}

impl<E: Engine> WorkerEngineCache<E> {
    /// Creates an empty cache for `worker`.
    pub fn new(worker: usize, prototype: Arc<EnginePrototype<E>>) -> Self {
        Self {
            worker,
            prototype,
            instance: None,
            clones: 0,
        }
    }

    /// Returns the id of the owning worker.
    pub fn worker_id(&self) -> usize {
        self.worker
    }

    /// Returns the worker's engine instance, forking one from the prototype
    /// if none is bound yet.
    pub fn get(&mut self) -> ValidatorResult<&mut E::Instance> {
        if self.instance.is_none() {
            let instance = self.fork()?;
            self.instance = Some(instance);
        }
        self.instance.as_mut().ok_or(ValidatorError::EngineNotReady)
    }

    /// Discards the bound instance; the next [`get`](Self::get) forks a
    /// fresh one.
    pub fn invalidate(&mut self) {
        if self.instance.take().is_some() {
            warn!(worker = self.worker, "Discarded engine instance bound to worker");
        }
    }

    /// Returns true if an instance is bound.
    pub fn is_bound(&self) -> bool {
        self.instance.is_some()
    }

    /// Returns how many instances this worker has forked.
    pub fn clone_count(&self) -> u64 {
        self.clones
    }

    fn fork(&mut self) -> ValidatorResult<E::Instance> {
        let engine = self.prototype.get()?;
        info!(worker = self.worker, "No engine bound to worker, cloning prototype");

        let started = Instant::now();
        let instance = engine.fork().map_err(|e| {
            error!(worker = self.worker, error = %e, "Failed to clone engine prototype");
            ValidatorError::EngineUnavailable {
                message: format!("{e:#}"),
            }
        })?;
        self.clones += 1;

        info!(
            worker = self.worker,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Engine instance bound to worker"
        );
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;
    use crate::engine::{EngineFactory, StructuralEngine, StructuralEngineFactory};
    use crate::version::FhirVersion;

    fn prototype() -> Arc<EnginePrototype<StructuralEngine>> {
        let engine = StructuralEngineFactory
            .prepare(FhirVersion::R4, &ValidatorConfig::default())
            .unwrap();
        Arc::new(EnginePrototype::ready(engine))
    }

    #[test]
    fn test_get_forks_once_and_reuses() {
        let mut cache = WorkerEngineCache::new(0, prototype());
        assert!(!cache.is_bound());

        let first = cache.get().unwrap().session_id();
        let second = cache.get().unwrap().session_id();

        assert_eq!(first, second);
        assert_eq!(cache.clone_count(), 1);
    }

    #[test]
    fn test_workers_get_distinct_instances() {
        let prototype = prototype();
        let mut a = WorkerEngineCache::new(0, Arc::clone(&prototype));
        let mut b = WorkerEngineCache::new(1, prototype);

        assert_ne!(a.get().unwrap().session_id(), b.get().unwrap().session_id());
    }

    #[test]
    fn test_invalidate_forks_fresh_instance() {
        let mut cache = WorkerEngineCache::new(0, prototype());
        let first = cache.get().unwrap().session_id();

        cache.invalidate();
        assert!(!cache.is_bound());

        let second = cache.get().unwrap().session_id();
        assert_ne!(first, second);
        assert_eq!(cache.clone_count(), 2);
    }

    #[test]
    fn test_uninitialized_prototype_is_not_ready() {
        let prototype: Arc<EnginePrototype<StructuralEngine>> = Arc::new(EnginePrototype::new());
        let mut cache = WorkerEngineCache::new(0, prototype);

        assert!(matches!(cache.get(), Err(ValidatorError::EngineNotReady)));
        assert_eq!(cache.clone_count(), 0);
    }

    #[test]
    fn test_install_once() {
        let prototype: EnginePrototype<StructuralEngine> = EnginePrototype::new();
        assert!(!prototype.is_ready());

        let engine = StructuralEngineFactory
            .prepare(FhirVersion::R4, &ValidatorConfig::default())
            .unwrap();
        prototype.install(engine.clone()).unwrap();
        assert!(prototype.is_ready());
        assert!(matches!(
            prototype.install(engine),
            Err(StartupError::AlreadyInitialized)
        ));
    }
}
