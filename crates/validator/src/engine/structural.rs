//! Built-in structural engine.
//!
//! A self-contained engine that runs without an external rule engine. It
//! performs JSON decoding, resource type checks, a small table of element
//! rules, coding/extension/reference policy checks, the `dom-6` best
//! practice check and profile resolution against the core resource profiles
//! and any StructureDefinitions loaded from implementation guides.
//!
//! Implementation guides are resolved from local paths or from the local
//! FHIR package cache (`<cache>/<name>#<version>/package`). Nothing is
//! downloaded.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Engine, EngineFactory, EngineInstance, ResourceFormat, is_valid_resource_type};
use crate::config::{BestPracticeLevel, SeverityLevel, ValidatorConfig};
use crate::error::{EngineFault, StartupError};
use crate::message::{IssueSeverity, IssueType, ValidationMessage};
use crate::outcome::{OperationOutcome, OutcomeIssue};
use crate::version::FhirVersion;

const ENGINE_VERSION: &str = concat!("helios-structural/", env!("CARGO_PKG_VERSION"));

const CORE_PROFILE_BASE: &str = "http://hl7.org/fhir/StructureDefinition/";
const DOM6_TEXT: &str = "Constraint failed: dom-6: 'A resource should have narrative for robust management' (defined in http://hl7.org/fhir/StructureDefinition/DomainResource) (Best Practice Recommendation)";
const DOM6_EXPRESSION: &str = "text.`div`.exists()";

const GENDER_SYSTEM: &str = "http://hl7.org/fhir/administrative-gender";
const OBSERVATION_STATUS_SYSTEM: &str = "http://hl7.org/fhir/observation-status";

/// Code systems defined by the core specification and checked locally.
const CORE_CODE_SYSTEMS: &[(&str, &[(&str, &str)])] = &[
    (
        GENDER_SYSTEM,
        &[
            ("male", "Male"),
            ("female", "Female"),
            ("other", "Other"),
            ("unknown", "Unknown"),
        ],
    ),
    (
        OBSERVATION_STATUS_SYSTEM,
        &[
            ("registered", "Registered"),
            ("preliminary", "Preliminary"),
            ("final", "Final"),
            ("amended", "Amended"),
            ("corrected", "Corrected"),
            ("cancelled", "Cancelled"),
            ("entered-in-error", "Entered in Error"),
            ("unknown", "Unknown"),
        ],
    ),
];

/// Code systems that are only checked by a terminology server.
const EXTERNAL_CODE_SYSTEMS: &[&str] = &[
    "http://loinc.org",
    "http://snomed.info/sct",
    "http://unitsofmeasure.org",
    "http://www.nlm.nih.gov/research/umls/rxnorm",
    "urn:ietf:bcp:47",
    "urn:iso:std:iso:3166",
];

/// Resources that are not DomainResources and so carry no narrative.
const NON_DOMAIN_RESOURCES: &[&str] = &["Bundle", "Binary", "Parameters"];

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}(-(0[1-9]|1[0-2])(-(0[1-9]|[12]\d|3[01]))?)?$").expect("valid date pattern")
});

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9\-.]{1,64}$").expect("valid id pattern"));

#[derive(Debug, Clone, Copy)]
enum ValueCheck {
    /// Required binding to a code system, with the value set name.
    Code(&'static str, &'static str),
    Boolean,
    Date,
    Present,
}

#[derive(Debug)]
struct ElementRule {
    resource: &'static str,
    element: &'static str,
    min: usize,
    check: ValueCheck,
}

const ELEMENT_RULES: &[ElementRule] = &[
    ElementRule {
        resource: "Patient",
        element: "gender",
        min: 0,
        check: ValueCheck::Code(GENDER_SYSTEM, "administrative-gender"),
    },
    ElementRule {
        resource: "Patient",
        element: "active",
        min: 0,
        check: ValueCheck::Boolean,
    },
    ElementRule {
        resource: "Patient",
        element: "birthDate",
        min: 0,
        check: ValueCheck::Date,
    },
    ElementRule {
        resource: "Patient",
        element: "deceasedBoolean",
        min: 0,
        check: ValueCheck::Boolean,
    },
    ElementRule {
        resource: "Observation",
        element: "status",
        min: 1,
        check: ValueCheck::Code(OBSERVATION_STATUS_SYSTEM, "observation-status"),
    },
    ElementRule {
        resource: "Observation",
        element: "code",
        min: 1,
        check: ValueCheck::Present,
    },
];

/// Engine policy switches taken from the configuration at prepare time.
#[derive(Debug, Clone)]
struct Policy {
    any_extensions_allowed: bool,
    allowed_extension_domains: Vec<String>,
    unknown_code_systems_cause_errors: bool,
    allow_example_urls: bool,
    display_warnings: bool,
    include_invariant_path_in_message: bool,
    minimum_severity_level: SeverityLevel,
    best_practice_level: BestPracticeLevel,
    verbose: bool,
    show_times: bool,
}

impl Policy {
    fn from_config(config: &ValidatorConfig) -> Self {
        Self {
            any_extensions_allowed: config.any_extensions_allowed,
            allowed_extension_domains: config
                .allowed_extension_domains
                .iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
            unknown_code_systems_cause_errors: config.unknown_code_systems_cause_errors,
            allow_example_urls: config.allow_example_urls,
            display_warnings: config.display_warnings,
            include_invariant_path_in_message: config.include_invariant_path_in_message,
            minimum_severity_level: config.minimum_severity_level,
            best_practice_level: config.best_practice_level,
            verbose: config.verbose,
            show_times: config.show_times,
        }
    }
}

/// A profile the engine can check resources against.
#[derive(Debug)]
struct ProfileDefinition {
    url: String,
    type_name: String,
    /// Top-level elements with a minimum cardinality of at least one.
    required_elements: Vec<String>,
}

impl ProfileDefinition {
    fn core(url: &str, type_name: &str) -> Self {
        Self {
            url: url.to_string(),
            type_name: type_name.to_string(),
            required_elements: Vec::new(),
        }
    }

    fn from_structure_definition(url: &str, type_name: &str, sd: &Value) -> Self {
        let mut required_elements = Vec::new();
        for section in ["differential", "snapshot"] {
            let Some(elements) = sd
                .get(section)
                .and_then(|s| s.get("element"))
                .and_then(Value::as_array)
            else {
                continue;
            };
            for element in elements {
                let min = element.get("min").and_then(Value::as_u64).unwrap_or(0);
                let Some(path) = element.get("path").and_then(Value::as_str) else {
                    continue;
                };
                if min == 0 {
                    continue;
                }
                if let Some((root, name)) = path.split_once('.') {
                    if root == type_name
                        && !name.contains('.')
                        && !required_elements.iter().any(|e| e == name)
                    {
                        required_elements.push(name.to_string());
                    }
                }
            }
        }

        Self {
            url: url.to_string(),
            type_name: type_name.to_string(),
            required_elements,
        }
    }
}

#[derive(Debug, Default)]
struct CodeSystemDefinition {
    /// Code to display.
    concepts: HashMap<String, Option<String>>,
}

impl CodeSystemDefinition {
    fn add_concepts(&mut self, concepts: &[Value]) {
        for concept in concepts {
            if let Some(code) = concept.get("code").and_then(Value::as_str) {
                let display = concept
                    .get("display")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                self.concepts.insert(code.to_string(), display);
            }
            if let Some(children) = concept.get("concept").and_then(Value::as_array) {
                self.add_concepts(children);
            }
        }
    }
}

/// Conformance resources indexed from the loaded packages.
#[derive(Debug, Default)]
struct PackageIndex {
    profiles: HashMap<String, Arc<ProfileDefinition>>,
    code_systems: HashMap<String, CodeSystemDefinition>,
    extensions: HashSet<String>,
}

impl PackageIndex {
    fn with_core_code_systems() -> Self {
        let mut index = Self::default();
        for (url, concepts) in CORE_CODE_SYSTEMS {
            let definition = CodeSystemDefinition {
                concepts: concepts
                    .iter()
                    .map(|(code, display)| (code.to_string(), Some(display.to_string())))
                    .collect(),
            };
            index.code_systems.insert(url.to_string(), definition);
        }
        index
    }

    /// Indexes one resource. Returns true if it was a conformance resource.
    fn index(&mut self, resource: &Value) -> bool {
        let url = resource.get("url").and_then(Value::as_str);
        match (resource.get("resourceType").and_then(Value::as_str), url) {
            (Some("StructureDefinition"), Some(url)) => {
                let Some(type_name) = resource.get("type").and_then(Value::as_str) else {
                    return false;
                };
                if type_name == "Extension" {
                    self.extensions.insert(url.to_string());
                }
                let definition = ProfileDefinition::from_structure_definition(url, type_name, resource);
                self.profiles.insert(url.to_string(), Arc::new(definition));
                true
            }
            (Some("CodeSystem"), Some(url)) => {
                let definition = self.code_systems.entry(url.to_string()).or_default();
                if let Some(concepts) = resource.get("concept").and_then(Value::as_array) {
                    definition.add_concepts(concepts);
                }
                true
            }
            _ => false,
        }
    }
}

/// Append-only log of terminology lookups the engine could not resolve.
#[derive(Debug)]
struct TerminologyLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl TerminologyLog {
    fn open(path: &Path) -> Result<Self, StartupError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| StartupError::TerminologyLog {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    fn record(&self, session: &Uuid, line: &str) {
        let mut file = self.file.lock();
        let timestamp = chrono::Utc::now().to_rfc3339();
        if let Err(e) = writeln!(file, "{timestamp} [{session}] {line}") {
            warn!(path = %self.path.display(), error = %e, "failed to write terminology log");
        }
    }
}

/// Loaded content shared read-only by the prototype and every instance.
#[derive(Debug)]
struct EngineContext {
    version: FhirVersion,
    policy: Policy,
    packages: Vec<String>,
    index: PackageIndex,
    terminology_server: Option<String>,
    terminology_log: Option<TerminologyLog>,
}

impl EngineContext {
    fn check_elements(
        &self,
        resource_type: &str,
        resource: &Map<String, Value>,
        out: &mut Vec<ValidationMessage>,
    ) {
        for rule in ELEMENT_RULES.iter().filter(|r| r.resource == resource_type) {
            let path = format!("{resource_type}.{}", rule.element);
            match resource.get(rule.element) {
                None | Some(Value::Null) => {
                    if rule.min > 0 {
                        out.push(ValidationMessage::error(
                            IssueType::Required,
                            &path,
                            format!("{path}: minimum required = {}, but only found 0", rule.min),
                        ));
                    }
                }
                Some(value) => self.check_value(rule.check, &path, value, out),
            }
        }

        if let Some(id) = resource.get("id") {
            let path = format!("{resource_type}.id");
            match id.as_str() {
                Some(id) if ID_PATTERN.is_match(id) => {}
                Some(id) => out.push(ValidationMessage::error(
                    IssueType::Value,
                    &path,
                    format!("Invalid Resource id '{id}'"),
                )),
                None => out.push(primitive_type_error(&path, "string")),
            }
        }
    }

    fn check_value(
        &self,
        check: ValueCheck,
        path: &str,
        value: &Value,
        out: &mut Vec<ValidationMessage>,
    ) {
        match check {
            ValueCheck::Code(system, value_set) => {
                let Some(code) = value.as_str() else {
                    out.push(primitive_type_error(path, "string"));
                    return;
                };
                let known = self
                    .index
                    .code_systems
                    .get(system)
                    .is_some_and(|cs| cs.concepts.contains_key(code));
                if !known {
                    out.push(ValidationMessage::error(
                        IssueType::CodeInvalid,
                        path,
                        format!(
                            "The value provided ('{code}') is not in the value set 'http://hl7.org/fhir/ValueSet/{value_set}|{}' (required binding)",
                            self.version.full_version()
                        ),
                    ));
                }
            }
            ValueCheck::Boolean => {
                if !value.is_boolean() {
                    out.push(primitive_type_error(path, "boolean"));
                }
            }
            ValueCheck::Date => match value.as_str() {
                Some(date) if DATE_PATTERN.is_match(date) => {}
                Some(date) => out.push(ValidationMessage::error(
                    IssueType::Value,
                    path,
                    format!("Not a valid date format: '{date}'"),
                )),
                None => out.push(primitive_type_error(path, "string")),
            },
            ValueCheck::Present => {}
        }
    }

    /// Walks the resource tree applying the coding, extension and
    /// reference checks.
    fn walk(&self, value: &Value, path: &str, session: &Uuid, out: &mut Vec<ValidationMessage>) {
        match value {
            Value::Object(map) => self.walk_object(map, path, session, out),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.walk(item, &format!("{path}[{i}]"), session, out);
                }
            }
            _ => {}
        }
    }

    fn walk_object(
        &self,
        map: &Map<String, Value>,
        path: &str,
        session: &Uuid,
        out: &mut Vec<ValidationMessage>,
    ) {
        for (key, child) in map {
            if key == "resourceType" {
                continue;
            }
            let child_path = format!("{path}.{key}");
            match (key.as_str(), child) {
                ("extension" | "modifierExtension", Value::Array(items)) => {
                    for (i, item) in items.iter().enumerate() {
                        let item_path = format!("{child_path}[{i}]");
                        match item.as_object() {
                            Some(extension) => self.check_extension(extension, &item_path, out),
                            None => out.push(ValidationMessage::error(
                                IssueType::Structure,
                                item_path,
                                "An extension must be a JSON object",
                            )),
                        }
                    }
                }
                ("coding", Value::Array(items)) => {
                    for (i, item) in items.iter().enumerate() {
                        if let Some(coding) = item.as_object() {
                            self.check_coding(coding, &format!("{child_path}[{i}]"), session, out);
                        }
                    }
                }
                ("reference", Value::String(reference)) => {
                    self.check_reference(reference, &child_path, out);
                }
                _ => {}
            }
            self.walk(child, &child_path, session, out);
        }
    }

    fn check_extension(
        &self,
        extension: &Map<String, Value>,
        path: &str,
        out: &mut Vec<ValidationMessage>,
    ) {
        let Some(url) = extension.get("url").and_then(Value::as_str) else {
            out.push(ValidationMessage::error(
                IssueType::Structure,
                path,
                "Extension.url is required in order to identify, use and validate the extension",
            ));
            return;
        };

        let policy = &self.policy;
        let allowed = policy.any_extensions_allowed
            || url.starts_with(CORE_PROFILE_BASE)
            || self.index.extensions.contains(url)
            || policy
                .allowed_extension_domains
                .iter()
                .any(|domain| url.starts_with(domain.as_str()));
        if !allowed {
            out.push(ValidationMessage::error(
                IssueType::Extension,
                path,
                format!("The extension {url} could not be found so is not allowed here"),
            ));
        }
    }

    fn check_coding(
        &self,
        coding: &Map<String, Value>,
        path: &str,
        session: &Uuid,
        out: &mut Vec<ValidationMessage>,
    ) {
        let Some(system) = coding.get("system").and_then(Value::as_str) else {
            return;
        };
        let code = coding.get("code").and_then(Value::as_str);
        let display = coding.get("display").and_then(Value::as_str);

        if let Some(code_system) = self.index.code_systems.get(system) {
            let Some(code) = code else { return };
            match code_system.concepts.get(code) {
                None => out.push(ValidationMessage::error(
                    IssueType::CodeInvalid,
                    path,
                    format!("Unknown code '{system}#{code}'"),
                )),
                Some(Some(expected)) => {
                    if let Some(display) = display {
                        if !display.eq_ignore_ascii_case(expected) {
                            let severity = if self.policy.display_warnings {
                                IssueSeverity::Warning
                            } else {
                                IssueSeverity::Error
                            };
                            out.push(ValidationMessage::new(
                                severity,
                                IssueType::CodeInvalid,
                                path,
                                format!(
                                    "Wrong Display Name '{display}' for {system}#{code}. Valid display is '{expected}'"
                                ),
                            ));
                        }
                    }
                }
                Some(None) => {}
            }
            return;
        }

        if EXTERNAL_CODE_SYSTEMS.contains(&system) {
            return;
        }

        if let Some(log) = &self.terminology_log {
            log.record(
                session,
                &format!(
                    "unresolved code system {system} (code {}) via {}",
                    code.unwrap_or("<none>"),
                    self.terminology_server.as_deref().unwrap_or("no terminology server")
                ),
            );
        }
        let severity = if self.policy.unknown_code_systems_cause_errors {
            IssueSeverity::Error
        } else {
            IssueSeverity::Warning
        };
        out.push(ValidationMessage::new(
            severity,
            IssueType::CodeInvalid,
            path,
            format!("A definition for CodeSystem '{system}' could not be found, so the code cannot be validated"),
        ));
    }

    fn check_reference(&self, reference: &str, path: &str, out: &mut Vec<ValidationMessage>) {
        if self.policy.allow_example_urls {
            return;
        }
        if reference.contains("://example.org") || reference.contains("://www.example.org") {
            out.push(ValidationMessage::error(
                IssueType::Invalid,
                path,
                format!("Example URLs are not allowed in this context ({reference})"),
            ));
        }
    }

    fn check_best_practice(
        &self,
        resource_type: &str,
        resource: &Map<String, Value>,
        out: &mut Vec<ValidationMessage>,
    ) {
        if NON_DOMAIN_RESOURCES.contains(&resource_type) {
            return;
        }
        let has_narrative = resource
            .get("text")
            .and_then(|text| text.get("div"))
            .is_some();
        if has_narrative {
            return;
        }
        let Some(severity) = self.policy.best_practice_level.severity() else {
            return;
        };
        let mut text = DOM6_TEXT.to_string();
        if self.policy.include_invariant_path_in_message {
            text.push_str(&format!(" [{DOM6_EXPRESSION}]"));
        }
        out.push(ValidationMessage::new(
            severity,
            IssueType::Invariant,
            resource_type,
            text,
        ));
    }
}

fn primitive_type_error(path: &str, expected: &str) -> ValidationMessage {
    ValidationMessage::error(
        IssueType::Structure,
        path,
        format!("Error parsing JSON: the primitive value must be a {expected}"),
    )
}

fn parse_resource(bytes: &[u8]) -> Result<Value, ValidationMessage> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationMessage::fatal(
            IssueType::Structure,
            "$",
            "The input is empty; no resource content was found",
        ));
    }
    serde_json::from_slice(bytes).map_err(|e| {
        ValidationMessage::fatal(
            IssueType::Structure,
            "$",
            format!("Unable to parse JSON: {e}"),
        )
        .at(e.line() as u32, e.column() as u32)
    })
}

fn not_supported(text: String) -> EngineFault {
    EngineFault::Outcome(OperationOutcome::with_issues(vec![OutcomeIssue::new(
        IssueSeverity::Error,
        IssueType::NotSupported,
        text,
    )]))
}

/// An implementation guide read from disk.
struct LoadedPackage {
    id: String,
    resources: Vec<Value>,
}

fn load_package(reference: &str, cache_dir: &Path) -> Result<LoadedPackage, StartupError> {
    let path = Path::new(reference);
    if path.exists() {
        return load_local_package(path);
    }

    match reference.split_once('#') {
        Some((name, version)) if !name.is_empty() && !version.is_empty() => {
            let dir = cache_dir.join(reference).join("package");
            if !dir.is_dir() {
                return Err(StartupError::PackageNotFound {
                    reference: reference.to_string(),
                    reason: format!("not found in package cache {}", cache_dir.display()),
                });
            }
            Ok(LoadedPackage {
                id: reference.to_string(),
                resources: read_json_dir(&dir)?,
            })
        }
        _ => Err(StartupError::PackageNotFound {
            reference: reference.to_string(),
            reason: "expected a local path or a package id of the form name#version".to_string(),
        }),
    }
}

fn load_local_package(path: &Path) -> Result<LoadedPackage, StartupError> {
    if !path.is_dir() {
        return Ok(LoadedPackage {
            id: path.display().to_string(),
            resources: vec![read_json_file(path)?],
        });
    }

    let dir = if path.join("package").is_dir() {
        path.join("package")
    } else {
        path.to_path_buf()
    };
    let id = read_manifest_id(&dir)?.unwrap_or_else(|| path.display().to_string());
    Ok(LoadedPackage {
        id,
        resources: read_json_dir(&dir)?,
    })
}

fn read_manifest_id(dir: &Path) -> Result<Option<String>, StartupError> {
    let manifest = dir.join("package.json");
    if !manifest.is_file() {
        return Ok(None);
    }
    let manifest = read_json_file(&manifest)?;
    let name = manifest.get("name").and_then(Value::as_str);
    let version = manifest.get("version").and_then(Value::as_str);
    Ok(match (name, version) {
        (Some(name), Some(version)) => Some(format!("{name}#{version}")),
        _ => None,
    })
}

fn read_json_dir(dir: &Path) -> Result<Vec<Value>, StartupError> {
    let entries = fs::read_dir(dir).map_err(|source| StartupError::PackageIo {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();
    paths.iter().map(|p| read_json_file(p)).collect()
}

fn read_json_file(path: &Path) -> Result<Value, StartupError> {
    let content = fs::read(path).map_err(|source| StartupError::PackageIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&content).map_err(|source| StartupError::PackageJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Prepares [`StructuralEngine`] prototypes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralEngineFactory;

impl EngineFactory for StructuralEngineFactory {
    type Engine = StructuralEngine;

    fn prepare(
        &self,
        version: FhirVersion,
        config: &ValidatorConfig,
    ) -> Result<StructuralEngine, StartupError> {
        let started = Instant::now();
        let core_package = version.core_package();
        info!(
            version = %version,
            core_package = %core_package,
            terminology_server = config.terminology_server().unwrap_or("none"),
            terminology_log = ?config.terminology_log(),
            "Preparing validation engine"
        );

        let mut index = PackageIndex::with_core_code_systems();
        let mut packages = vec![core_package];
        let cache_dir = config.package_cache_dir();

        for reference in config.implementation_guides() {
            let package = load_package(reference, &cache_dir)?;
            let indexed = package
                .resources
                .iter()
                .filter(|resource| index.index(resource))
                .count();
            info!(
                package = %package.id,
                resources = package.resources.len(),
                indexed,
                "Loaded implementation guide"
            );
            packages.push(package.id);
        }

        let terminology_log = config
            .terminology_log()
            .map(|path| TerminologyLog::open(path))
            .transpose()?;

        info!(
            packages = packages.len(),
            profiles = index.profiles.len(),
            code_systems = index.code_systems.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Validation engine prepared"
        );

        Ok(StructuralEngine {
            context: Arc::new(EngineContext {
                version,
                policy: Policy::from_config(config),
                packages,
                index,
                terminology_server: config.terminology_server().map(str::to_string),
                terminology_log,
            }),
        })
    }
}

/// The prepared structural engine prototype.
#[derive(Debug, Clone)]
pub struct StructuralEngine {
    context: Arc<EngineContext>,
}

impl StructuralEngine {
    /// Returns the FHIR version the engine was prepared for.
    pub fn version(&self) -> FhirVersion {
        self.context.version
    }

    /// Returns the configured terminology server, if any.
    pub fn terminology_server(&self) -> Option<&str> {
        self.context.terminology_server.as_deref()
    }
}

impl Engine for StructuralEngine {
    type Instance = StructuralInstance;

    fn fork(&self) -> anyhow::Result<StructuralInstance> {
        let instance = StructuralInstance {
            context: Arc::clone(&self.context),
            session_id: Uuid::new_v4(),
            validations: 0,
            profile_cache: HashMap::new(),
        };
        debug!(session = %instance.session_id, "Forked structural engine instance");
        Ok(instance)
    }

    fn loaded_packages(&self) -> Vec<String> {
        self.context.packages.clone()
    }

    fn engine_version(&self) -> &str {
        ENGINE_VERSION
    }
}

/// A worker-local structural engine instance.
#[derive(Debug)]
pub struct StructuralInstance {
    context: Arc<EngineContext>,
    session_id: Uuid,
    validations: u64,
    profile_cache: HashMap<String, Option<Arc<ProfileDefinition>>>,
}

impl StructuralInstance {
    /// Returns the validation session id of this instance.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Returns how many resources this instance has validated.
    pub fn validation_count(&self) -> u64 {
        self.validations
    }

    fn resolve_profile(&mut self, reference: &str) -> Option<Arc<ProfileDefinition>> {
        let url = reference.split('|').next().unwrap_or(reference);
        if let Some(cached) = self.profile_cache.get(url) {
            return cached.clone();
        }

        let context = &self.context;
        let resolved = context.index.profiles.get(url).cloned().or_else(|| {
            url.strip_prefix(CORE_PROFILE_BASE)
                .filter(|type_name| is_valid_resource_type(context.version, type_name))
                .map(|type_name| Arc::new(ProfileDefinition::core(url, type_name)))
        });
        self.profile_cache.insert(url.to_string(), resolved.clone());
        resolved
    }

    fn check_profile(
        &self,
        profile: &ProfileDefinition,
        resource_type: &str,
        resource: &Map<String, Value>,
        out: &mut Vec<ValidationMessage>,
    ) -> bool {
        if profile.type_name != resource_type {
            out.push(ValidationMessage::error(
                IssueType::Structure,
                resource_type,
                format!(
                    "Specified profile type was '{}' in profile '{}', but found type '{}'",
                    profile.type_name, profile.url, resource_type
                ),
            ));
            return false;
        }

        for element in &profile.required_elements {
            let present = match element.strip_suffix("[x]") {
                Some(prefix) => resource
                    .keys()
                    .any(|key| key.len() > prefix.len() && key.starts_with(prefix)),
                None => resource
                    .get(element)
                    .is_some_and(|value| !value.is_null() && value.as_array().is_none_or(|a| !a.is_empty())),
            };
            if !present {
                out.push(ValidationMessage::error(
                    IssueType::Required,
                    format!("{resource_type}.{element}"),
                    format!(
                        "{resource_type}.{element}: minimum required = 1, but only found 0 (from {})",
                        profile.url
                    ),
                ));
            }
        }
        true
    }
}

impl EngineInstance for StructuralInstance {
    fn validate(
        &mut self,
        bytes: &[u8],
        format: ResourceFormat,
        profiles: &[String],
    ) -> Result<Vec<ValidationMessage>, EngineFault> {
        let started = Instant::now();
        self.validations += 1;

        if format == ResourceFormat::Xml {
            return Err(not_supported(
                "XML content is not supported by this engine; submit FHIR JSON".to_string(),
            ));
        }

        let resource = match parse_resource(bytes) {
            Ok(Value::Object(resource)) => resource,
            Ok(_) => {
                return Ok(vec![ValidationMessage::error(
                    IssueType::Structure,
                    "$",
                    "The JSON content must be an object",
                )]);
            }
            Err(message) => return Ok(vec![message]),
        };

        let resource_type = match resource.get("resourceType") {
            Some(Value::String(resource_type)) => resource_type.clone(),
            Some(_) => return Ok(vec![primitive_type_error("resourceType", "string")]),
            None => {
                return Ok(vec![ValidationMessage::error(
                    IssueType::Structure,
                    "$",
                    "Unable to find resourceType property",
                )]);
            }
        };

        if !is_valid_resource_type(self.context.version, &resource_type) {
            return Err(not_supported(format!(
                "Unknown resource type '{}' for FHIR {}",
                resource_type,
                self.context.version.full_version()
            )));
        }

        let mut messages = Vec::new();
        let mut checked = vec![format!("{CORE_PROFILE_BASE}{resource_type}")];

        self.context
            .check_elements(&resource_type, &resource, &mut messages);
        self.context
            .walk_object(&resource, &resource_type, &self.session_id, &mut messages);
        self.context
            .check_best_practice(&resource_type, &resource, &mut messages);

        for profile in profiles {
            match self.resolve_profile(profile) {
                Some(definition) => {
                    if self.check_profile(&definition, &resource_type, &resource, &mut messages) {
                        checked.push(definition.url.clone());
                    }
                }
                None => messages.push(ValidationMessage::error(
                    IssueType::Processing,
                    &resource_type,
                    format!("Profile reference '{profile}' has not been checked because it is unknown"),
                )),
            }
        }

        let declared: Vec<String> = resource
            .get("meta")
            .and_then(|meta| meta.get("profile"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|p| !profiles.iter().any(|requested| requested == p))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        for profile in &declared {
            match self.resolve_profile(profile) {
                Some(definition) => {
                    if self.check_profile(&definition, &resource_type, &resource, &mut messages) {
                        checked.push(definition.url.clone());
                    }
                }
                None => messages.push(ValidationMessage::warning(
                    IssueType::Processing,
                    format!("{resource_type}.meta.profile"),
                    format!("Profile reference '{profile}' has not been checked because it is unknown"),
                )),
            }
        }

        let level = self.context.policy.minimum_severity_level;
        messages.retain(|m| level.reports(m.severity));

        if self.context.policy.verbose {
            for url in &checked {
                messages.push(ValidationMessage::information(
                    IssueType::Informational,
                    &resource_type,
                    format!("Validated resource against profile {url}"),
                ));
            }
        }
        if self.context.policy.show_times {
            messages.push(ValidationMessage::information(
                IssueType::Informational,
                &resource_type,
                format!(
                    "Validation completed in {} ms",
                    started.elapsed().as_millis()
                ),
            ));
        }

        debug!(
            session = %self.session_id,
            validations = self.validations,
            resource_type = %resource_type,
            messages = messages.len(),
            "Structural validation finished"
        );
        Ok(messages)
    }
}
