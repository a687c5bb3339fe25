//! Single-resource validation.
//!
//! [`validate_resource`] is the containment boundary: whatever the engine
//! does (return messages, return a structured outcome, fail, or panic) the
//! caller gets a well-formed outcome back. Only a missing engine surfaces
//! as an error.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe, catch_unwind};
use std::sync::Once;
use std::time::Instant;

use tracing::{error, info};

use crate::cache::WorkerEngineCache;
use crate::config::OutputOptions;
use crate::engine::{Engine, EngineInstance, ResourceFormat};
use crate::error::{EngineFault, ValidatorResult};
use crate::format::FormatAdapter;
use crate::message::{IssueSeverity, IssueType, ValidationMessage};
use crate::outcome::{ALL_OK, OperationOutcome, OutcomeIssue, compose};

thread_local! {
    /// Trace of the last panic raised on this thread.
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chains a hook that records a backtrace for every panic on the panicking
/// thread, so the containment boundary can report it.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = format!("{info}\nstack backtrace:\n{}", Backtrace::force_capture());
            PANIC_TRACE.with(|cell| *cell.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<String> {
    PANIC_TRACE.with(|cell| cell.borrow_mut().take())
}

/// Renders an internal fault with its cause chain and a stack trace.
///
/// Uses the backtrace captured with the error when there is one, otherwise
/// captures one here.
fn fault_trace(err: &anyhow::Error) -> String {
    let backtrace = err.backtrace();
    if backtrace.status() == BacktraceStatus::Captured {
        format!("{err:#}\nstack backtrace:\n{backtrace}")
    } else {
        format!("{err:#}\nstack backtrace:\n{}", Backtrace::force_capture())
    }
}

/// The result of validating one resource.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// The serialized `OperationOutcome`; always matches `outcome`.
    pub outcome_bytes: Vec<u8>,
    /// The outcome that was serialized.
    pub outcome: OperationOutcome,
    /// The diagnostic messages behind the outcome.
    pub messages: Vec<ValidationMessage>,
}

impl ValidationResult {
    /// Returns true if the outcome has an error or fatal issue.
    pub fn has_error(&self) -> bool {
        self.outcome.has_error()
    }
}

/// Drops blank profile identifiers, preserving order.
pub fn normalize_profiles<S: AsRef<str>>(profiles: &[S]) -> Vec<String> {
    profiles
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validates one resource on the calling worker's engine instance.
pub fn validate_resource<E: Engine>(
    cache: &mut WorkerEngineCache<E>,
    bytes: &[u8],
    format: ResourceFormat,
    profiles: &[String],
    adapter: &dyn FormatAdapter,
    options: OutputOptions,
) -> ValidatorResult<ValidationResult> {
    let started = Instant::now();
    let profiles = normalize_profiles(profiles);
    let worker = cache.worker_id();

    let engine = cache.get()?;
    install_panic_hook();
    take_panic_trace();
    let result = catch_unwind(AssertUnwindSafe(|| {
        engine.validate(bytes, format, &profiles)
    }));

    let (outcome, messages) = match result {
        Ok(Ok(messages)) => {
            let composed = compose(messages);
            (composed.outcome, composed.messages)
        }
        Ok(Err(EngineFault::Outcome(mut outcome))) => {
            if outcome.issues.is_empty() {
                outcome = OperationOutcome::with_issues(vec![OutcomeIssue::new(
                    IssueSeverity::Information,
                    IssueType::Informational,
                    ALL_OK,
                )]);
            }
            let messages = outcome.to_messages();
            (outcome, messages)
        }
        Ok(Err(EngineFault::Internal(err))) => {
            let trace = fault_trace(&err);
            error!(
                worker,
                error = %err,
                trace = %trace,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Validation failed with an internal engine fault"
            );
            internal_fault(&err.to_string(), &trace)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            let trace = take_panic_trace().unwrap_or_else(|| {
                format!(
                    "engine panicked on worker {worker}: {message}\nstack backtrace:\n{}",
                    Backtrace::force_capture()
                )
            });
            error!(
                worker,
                error = %message,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Validation engine panicked"
            );
            // The instance may be in an inconsistent state.
            cache.invalidate();
            internal_fault(&message, &trace)
        }
    };

    let mut outcome = adapter.convert_outcome(outcome);
    if options.remove_narrative_text {
        outcome.remove_text();
    }
    let outcome_bytes = serde_json::to_vec(&adapter.compose_outcome(&outcome))?;

    info!(
        worker,
        bytes = bytes.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        issues = outcome.issues.len(),
        has_error = outcome.has_error(),
        "validated {} bytes in {} ms",
        bytes.len(),
        started.elapsed().as_millis()
    );

    Ok(ValidationResult {
        outcome_bytes,
        outcome,
        messages,
    })
}

/// Builds the outcome and message list reported for an internal fault.
fn internal_fault(message: &str, trace: &str) -> (OperationOutcome, Vec<ValidationMessage>) {
    let message = if message.is_empty() {
        "Unexpected internal error during validation"
    } else {
        message
    };
    (
        OperationOutcome::from_fault(message, trace),
        vec![ValidationMessage::fatal(IssueType::Exception, trace, message)],
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "validation engine panicked".to_string()
    }
}
