//! Version-specific wire formats.
//!
//! Validation runs through one pipeline regardless of FHIR version. What
//! differs between R4 and R5 (outcome rendering, allowed issue codes, the
//! shape of the response bundle) lives behind [`FormatAdapter`], selected
//! once per request with [`adapter_for`].

use serde_json::{Value, json};

use crate::bundle::BundleResponseEntry;
use crate::message::IssueType;
use crate::outcome::{OperationOutcome, OutcomeIssue};
use crate::version::FhirVersion;

/// Extension carrying the source line of an issue.
pub const ISSUE_LINE_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/operationoutcome-issue-line";

/// Extension carrying the source column of an issue.
pub const ISSUE_COL_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/operationoutcome-issue-col";

/// Status reported on every response bundle entry.
pub const ENTRY_RESPONSE_STATUS: &str = "200 OK";

/// Parser, composer and outcome converter for one FHIR version.
pub trait FormatAdapter: Send + Sync {
    /// The version this adapter handles.
    fn version(&self) -> FhirVersion;

    /// Parses a JSON resource.
    fn parse(&self, bytes: &[u8]) -> serde_json::Result<Value> {
        serde_json::from_slice(bytes)
    }

    /// Renders an outcome as an `OperationOutcome` resource.
    fn compose_outcome(&self, outcome: &OperationOutcome) -> Value;

    /// Renders the response bundle of a batch validation.
    fn compose_bundle(&self, entries: &[BundleResponseEntry]) -> Value {
        let entries: Vec<Value> = entries
            .iter()
            .map(|entry| {
                let mut value = json!({});
                if let Some(full_url) = &entry.full_url {
                    value["fullUrl"] = json!(full_url);
                }
                value["response"] = json!({
                    "status": ENTRY_RESPONSE_STATUS,
                    "outcome": self.compose_outcome(&entry.outcome)
                });
                value
            })
            .collect();

        let mut bundle = json!({
            "resourceType": "Bundle",
            "type": "batch-response"
        });
        if !entries.is_empty() {
            bundle["entry"] = Value::Array(entries);
        }
        bundle
    }

    /// Adapts an outcome to the codes this version allows.
    fn convert_outcome(&self, outcome: OperationOutcome) -> OperationOutcome {
        outcome
    }
}

/// FHIR R4 (4.0.1).
#[derive(Debug, Clone, Copy, Default)]
pub struct R4Adapter;

/// FHIR R5 (5.0.0).
#[derive(Debug, Clone, Copy, Default)]
pub struct R5Adapter;

static R4: R4Adapter = R4Adapter;
static R5: R5Adapter = R5Adapter;

/// Returns the adapter for `version`.
pub fn adapter_for(version: FhirVersion) -> &'static dyn FormatAdapter {
    match version {
        FhirVersion::R4 => &R4,
        FhirVersion::R5 => &R5,
    }
}

impl FormatAdapter for R4Adapter {
    fn version(&self) -> FhirVersion {
        FhirVersion::R4
    }

    fn compose_outcome(&self, outcome: &OperationOutcome) -> Value {
        compose_outcome(outcome, true)
    }

    fn convert_outcome(&self, mut outcome: OperationOutcome) -> OperationOutcome {
        // `success` was added to issue-type in R5.
        for issue in &mut outcome.issues {
            if issue.code == IssueType::Success {
                issue.code = IssueType::Informational;
            }
        }
        outcome
    }
}

impl FormatAdapter for R5Adapter {
    fn version(&self) -> FhirVersion {
        FhirVersion::R5
    }

    fn compose_outcome(&self, outcome: &OperationOutcome) -> Value {
        compose_outcome(outcome, false)
    }
}

fn compose_outcome(outcome: &OperationOutcome, with_location: bool) -> Value {
    let issues: Vec<Value> = outcome
        .issues
        .iter()
        .map(|issue| compose_issue(issue, with_location))
        .collect();

    let mut value = json!({ "resourceType": "OperationOutcome" });
    if let Some(text) = &outcome.text {
        value["text"] = json!({
            "status": "generated",
            "div": text.div
        });
    }
    value["issue"] = Value::Array(issues);
    value
}

fn compose_issue(issue: &OutcomeIssue, with_location: bool) -> Value {
    let mut value = json!({});

    let mut extensions = Vec::new();
    if let Some(line) = issue.line {
        extensions.push(json!({ "url": ISSUE_LINE_EXTENSION, "valueInteger": line }));
    }
    if let Some(col) = issue.col {
        extensions.push(json!({ "url": ISSUE_COL_EXTENSION, "valueInteger": col }));
    }
    if !extensions.is_empty() {
        value["extension"] = Value::Array(extensions);
    }

    value["severity"] = json!(issue.severity.as_str());
    value["code"] = json!(issue.code.as_str());
    value["details"] = json!({ "text": issue.details });
    if let Some(diagnostics) = &issue.diagnostics {
        value["diagnostics"] = json!(diagnostics);
    }
    if let Some(expression) = &issue.expression {
        if with_location {
            value["location"] = json!([expression]);
        }
        value["expression"] = json!([expression]);
    }
    value
}
