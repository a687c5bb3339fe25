//! OperationOutcome model and composition.
//!
//! [`compose`] turns the raw message list returned by an engine into a
//! deterministic outcome: duplicates are collapsed, the remainder is sorted by
//! the message ordering, and an empty list becomes a single informational
//! "All OK" issue. [`OperationOutcome::has_error`] is the pass/fail predicate.
//!
//! The model is version neutral. Rendering to R4 or R5 JSON is done by the
//! [`format`](crate::format) adapters.

use crate::message::{IssueSeverity, IssueType, ValidationMessage};

/// Details text of the issue added when validation found nothing.
pub const ALL_OK: &str = "All OK";

/// An issue in an OperationOutcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeIssue {
    /// The severity of the issue.
    pub severity: IssueSeverity,
    /// The type/code of the issue.
    pub code: IssueType,
    /// Human-readable description.
    pub details: String,
    /// Additional technical detail (stack traces for internal faults).
    pub diagnostics: Option<String>,
    /// FHIRPath expression for location.
    pub expression: Option<String>,
    /// Line in the source document.
    pub line: Option<u32>,
    /// Column in the source document.
    pub col: Option<u32>,
}

impl OutcomeIssue {
    /// Creates a new issue.
    pub fn new(severity: IssueSeverity, code: IssueType, details: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            details: details.into(),
            diagnostics: None,
            expression: None,
            line: None,
            col: None,
        }
    }

    /// Sets the expression (location).
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Sets the diagnostics text.
    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = Some(diagnostics.into());
        self
    }

    /// Converts the issue back into a diagnostic message.
    pub fn to_message(&self) -> ValidationMessage {
        let location = self
            .expression
            .clone()
            .or_else(|| self.diagnostics.clone())
            .unwrap_or_default();
        ValidationMessage {
            severity: self.severity,
            location,
            text: self.details.clone(),
            kind: self.code,
            line: self.line,
            col: self.col,
        }
    }
}

impl From<&ValidationMessage> for OutcomeIssue {
    fn from(message: &ValidationMessage) -> Self {
        Self {
            severity: message.severity,
            code: message.kind,
            details: message.text.clone(),
            diagnostics: None,
            expression: (!message.location.is_empty()).then(|| message.location.clone()),
            line: message.line,
            col: message.col,
        }
    }
}

/// Generated narrative of an outcome (`OperationOutcome.text`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narrative {
    /// XHTML content.
    pub div: String,
}

/// A structured diagnostic report for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationOutcome {
    /// Issues in output order.
    pub issues: Vec<OutcomeIssue>,
    /// Narrative, absent when removed by configuration.
    pub text: Option<Narrative>,
}

impl OperationOutcome {
    /// Creates an outcome from issues and generates its narrative.
    pub fn with_issues(issues: Vec<OutcomeIssue>) -> Self {
        let mut outcome = Self { issues, text: None };
        outcome.text = Some(outcome.render_narrative());
        outcome
    }

    /// Creates the outcome reported for an unexpected internal fault: one
    /// FATAL `exception` issue carrying the fault message, with the trace
    /// as diagnostics.
    pub fn from_fault(message: &str, trace: &str) -> Self {
        let mut issue = OutcomeIssue::new(IssueSeverity::Fatal, IssueType::Exception, message);
        if !trace.is_empty() {
            issue = issue.with_diagnostics(trace);
        }
        Self::with_issues(vec![issue])
    }

    /// Returns true if any issue has severity error or fatal.
    pub fn has_error(&self) -> bool {
        self.issues.iter().any(|i| i.severity.is_error())
    }

    /// Drops the narrative.
    pub fn remove_text(&mut self) {
        self.text = None;
    }

    /// Returns the issues as diagnostic messages.
    pub fn to_messages(&self) -> Vec<ValidationMessage> {
        self.issues.iter().map(OutcomeIssue::to_message).collect()
    }

    /// One-line summary: `Success: 0 errors, 1 warnings, 0 notes`.
    pub fn summary(&self) -> String {
        let mut errors = 0;
        let mut warnings = 0;
        let mut notes = 0;
        for issue in &self.issues {
            match issue.severity {
                IssueSeverity::Fatal | IssueSeverity::Error => errors += 1,
                IssueSeverity::Warning => warnings += 1,
                IssueSeverity::Information => notes += 1,
            }
        }
        format!(
            "{}: {} errors, {} warnings, {} notes",
            if errors == 0 { "Success" } else { "*FAILURE*" },
            errors,
            warnings,
            notes
        )
    }

    fn render_narrative(&self) -> Narrative {
        let mut div = String::from("<div xmlns=\"http://www.w3.org/1999/xhtml\">");
        div.push_str("<p>");
        div.push_str(&escape_xhtml(&self.summary()));
        div.push_str("</p>");
        if !self.issues.is_empty() {
            div.push_str("<table><tr><td><b>Severity</b></td><td><b>Location</b></td><td><b>Details</b></td></tr>");
            for issue in &self.issues {
                div.push_str("<tr><td>");
                div.push_str(issue.severity.display());
                div.push_str("</td><td>");
                div.push_str(&escape_xhtml(issue.expression.as_deref().unwrap_or("")));
                div.push_str("</td><td>");
                div.push_str(&escape_xhtml(&issue.details));
                div.push_str("</td></tr>");
            }
            div.push_str("</table>");
        }
        div.push_str("</div>");
        Narrative { div }
    }
}

/// Result of composing an engine's raw message list.
#[derive(Debug, Clone)]
pub struct Composed {
    /// The outcome, with narrative.
    pub outcome: OperationOutcome,
    /// The deduplicated, sorted messages the outcome was built from.
    pub messages: Vec<ValidationMessage>,
}

/// Deduplicates and sorts messages and renders them into an outcome.
///
/// An empty message list yields exactly one INFORMATION issue with
/// [`ALL_OK`] as its details, so an outcome never has zero issues.
pub fn compose(mut messages: Vec<ValidationMessage>) -> Composed {
    // Sorting first makes equal messages adjacent, so dedup removes all repeats.
    messages.sort();
    messages.dedup();

    let mut issues: Vec<OutcomeIssue> = messages.iter().map(OutcomeIssue::from).collect();
    if issues.is_empty() {
        issues.push(OutcomeIssue::new(
            IssueSeverity::Information,
            IssueType::Informational,
            ALL_OK,
        ));
    }

    Composed {
        outcome: OperationOutcome::with_issues(issues),
        messages,
    }
}

fn escape_xhtml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
