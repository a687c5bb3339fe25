//! Diagnostic messages produced by the validation engine.
//!
//! A [`ValidationMessage`] is one finding about one resource. Messages have a
//! total ordering (severity, then location, then text) which the outcome
//! composer uses to produce stable output.

use std::fmt;

use serde::Serialize;

/// Issue severity levels.
///
/// Variants are declared from most to least severe so the derived ordering
/// sorts fatal issues first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Fatal error - processing cannot continue.
    Fatal,
    /// Error - the resource is not valid.
    Error,
    /// Warning - the resource is valid but with concerns.
    Warning,
    /// Information - informational message.
    Information,
}

impl IssueSeverity {
    /// Returns the FHIR string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Fatal => "fatal",
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
            IssueSeverity::Information => "information",
        }
    }

    /// Returns the display name used in narratives.
    pub fn display(&self) -> &'static str {
        match self {
            IssueSeverity::Fatal => "Fatal",
            IssueSeverity::Error => "Error",
            IssueSeverity::Warning => "Warning",
            IssueSeverity::Information => "Information",
        }
    }

    /// Returns true for error and fatal severities.
    pub fn is_error(&self) -> bool {
        matches!(self, IssueSeverity::Fatal | IssueSeverity::Error)
    }

    /// Parses a FHIR severity code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "fatal" => Some(IssueSeverity::Fatal),
            "error" => Some(IssueSeverity::Error),
            "warning" => Some(IssueSeverity::Warning),
            "information" => Some(IssueSeverity::Information),
            _ => None,
        }
    }
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue type codes from the FHIR `issue-type` value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    /// Invalid content.
    Invalid,
    /// Structural issue.
    Structure,
    /// Required element missing.
    Required,
    /// Element value invalid.
    Value,
    /// Invariant violated.
    Invariant,
    /// Code not valid in its value set or code system.
    CodeInvalid,
    /// Unacceptable extension.
    Extension,
    /// Business rule violated.
    BusinessRule,
    /// Not supported.
    NotSupported,
    /// Processing error.
    Processing,
    /// Transient error.
    Transient,
    /// Unexpected internal failure.
    Exception,
    /// Informational message.
    Informational,
    /// Success message (R5 only).
    Success,
}

impl IssueType {
    /// Returns the FHIR code string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Invalid => "invalid",
            IssueType::Structure => "structure",
            IssueType::Required => "required",
            IssueType::Value => "value",
            IssueType::Invariant => "invariant",
            IssueType::CodeInvalid => "code-invalid",
            IssueType::Extension => "extension",
            IssueType::BusinessRule => "business-rule",
            IssueType::NotSupported => "not-supported",
            IssueType::Processing => "processing",
            IssueType::Transient => "transient",
            IssueType::Exception => "exception",
            IssueType::Informational => "informational",
            IssueType::Success => "success",
        }
    }

    /// Parses a FHIR issue type code. Unknown codes map to `Processing`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "invalid" => IssueType::Invalid,
            "structure" => IssueType::Structure,
            "required" => IssueType::Required,
            "value" => IssueType::Value,
            "invariant" => IssueType::Invariant,
            "code-invalid" => IssueType::CodeInvalid,
            "extension" => IssueType::Extension,
            "business-rule" => IssueType::BusinessRule,
            "not-supported" => IssueType::NotSupported,
            "transient" => IssueType::Transient,
            "exception" => IssueType::Exception,
            "informational" => IssueType::Informational,
            "success" => IssueType::Success,
            _ => IssueType::Processing,
        }
    }
}

/// One diagnostic produced while validating a resource.
///
/// Field order drives the derived ordering: severity first, then location,
/// then text. Equality is full value equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ValidationMessage {
    /// How serious the finding is.
    pub severity: IssueSeverity,
    /// Where in the resource the finding applies (a FHIRPath-like path, or a
    /// stack trace for internal faults).
    pub location: String,
    /// Human-readable description.
    #[serde(rename = "message")]
    pub text: String,
    /// Kind of finding.
    #[serde(rename = "type")]
    pub kind: IssueType,
    /// Line in the source document, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Column in the source document, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
}

impl ValidationMessage {
    /// Creates a new message without line/column information.
    pub fn new(
        severity: IssueSeverity,
        kind: IssueType,
        location: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            location: location.into(),
            text: text.into(),
            kind,
            line: None,
            col: None,
        }
    }

    /// Creates a fatal message.
    pub fn fatal(kind: IssueType, location: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Fatal, kind, location, text)
    }

    /// Creates an error message.
    pub fn error(kind: IssueType, location: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Error, kind, location, text)
    }

    /// Creates a warning message.
    pub fn warning(kind: IssueType, location: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Warning, kind, location, text)
    }

    /// Creates an information message.
    pub fn information(
        kind: IssueType,
        location: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(IssueSeverity::Information, kind, location, text)
    }

    /// Sets the source position.
    pub fn at(mut self, line: u32, col: u32) -> Self {
        self.line = Some(line);
        self.col = Some(col);
        self
    }
}
