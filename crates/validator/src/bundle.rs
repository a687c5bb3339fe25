//! Batch bundle validation.
//!
//! A request bundle is scanned completely before any entry reaches the
//! engine. The first structural violation, in entry order, aborts the whole
//! request with a [`BundleError`]. Once the scan passes, every entry is
//! validated on its own with [`validate_resource`] and the outcomes are
//! collected into a `batch-response` bundle in request order. A fault in one
//! entry becomes that entry's outcome and never affects its siblings.

use std::collections::HashSet;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::cache::WorkerEngineCache;
use crate::config::OutputOptions;
use crate::engine::{Engine, ResourceFormat};
use crate::error::{BundleError, ValidatorResult};
use crate::format::FormatAdapter;
use crate::outcome::OperationOutcome;
use crate::validator::validate_resource;

/// One entry of a structurally valid request bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEntry {
    /// The entry's `fullUrl`, if it had one.
    pub full_url: Option<String>,
    /// The entry's resource.
    pub resource: Map<String, Value>,
}

/// A request bundle that passed the structural scan.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBundle {
    /// The declared bundle type.
    pub bundle_type: String,
    /// Entries in request order.
    pub entries: Vec<RequestEntry>,
}

/// One entry of the response bundle.
#[derive(Debug, Clone)]
pub struct BundleResponseEntry {
    /// Mirrors the request entry's `fullUrl`.
    pub full_url: Option<String>,
    /// The entry's validation outcome.
    pub outcome: OperationOutcome,
}

/// The result of validating a bundle.
#[derive(Debug, Clone)]
pub struct BundleValidation {
    /// The serialized response bundle.
    pub bundle_bytes: Vec<u8>,
    /// Response entries in request order.
    pub entries: Vec<BundleResponseEntry>,
}

impl BundleValidation {
    /// Returns true if any entry's outcome has an error.
    pub fn has_error(&self) -> bool {
        self.entries.iter().any(|e| e.outcome.has_error())
    }
}

/// Scans a request bundle, enforcing every structural rule.
pub fn parse_request_bundle(
    bytes: &[u8],
    adapter: &dyn FormatAdapter,
    accepted_types: &[String],
) -> Result<RequestBundle, BundleError> {
    let value = adapter
        .parse(bytes)
        .map_err(|e| BundleError::MalformedInput {
            reason: e.to_string(),
        })?;
    let mut bundle = match value {
        Value::Object(bundle) => bundle,
        other => {
            return Err(BundleError::MalformedInput {
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            });
        }
    };

    match bundle.get("resourceType") {
        Some(Value::String(resource_type)) if resource_type == "Bundle" => {}
        Some(Value::String(resource_type)) => {
            return Err(BundleError::InvalidResourceType {
                found: resource_type.clone(),
            });
        }
        Some(other) => {
            return Err(BundleError::InvalidResourceType {
                found: other.to_string(),
            });
        }
        None => {
            return Err(BundleError::InvalidResourceType {
                found: "<missing>".to_string(),
            });
        }
    }

    let bundle_type = match bundle.get("type") {
        Some(Value::String(bundle_type)) if accepted_types.contains(bundle_type) => {
            bundle_type.clone()
        }
        found => {
            return Err(BundleError::InvalidBundleType {
                found: found.map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
                accepted: accepted_types.to_vec(),
            });
        }
    };

    let raw_entries = match bundle.remove("entry") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(BundleError::InvalidEntryList),
    };

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(raw_entries.len());
    for (index, entry) in raw_entries.into_iter().enumerate() {
        let Value::Object(mut entry) = entry else {
            return Err(BundleError::InvalidEntryShape { index });
        };

        let resource = match entry.remove("resource") {
            Some(Value::Object(resource)) => resource,
            _ => return Err(BundleError::MissingEntryResource { index }),
        };

        let full_url = match entry.remove("fullUrl") {
            None | Some(Value::Null) => None,
            Some(Value::String(full_url)) => {
                if !seen.insert(full_url.clone()) {
                    return Err(BundleError::DuplicateFullUrl { index, full_url });
                }
                Some(full_url)
            }
            Some(_) => return Err(BundleError::InvalidFullUrl { index }),
        };

        entries.push(RequestEntry { full_url, resource });
    }

    Ok(RequestBundle {
        bundle_type,
        entries,
    })
}

/// Validates a request bundle entry by entry.
///
/// Entries are validated without profiles.
pub fn validate_bundle<E: Engine>(
    cache: &mut WorkerEngineCache<E>,
    bytes: &[u8],
    adapter: &dyn FormatAdapter,
    options: OutputOptions,
    accepted_types: &[String],
) -> ValidatorResult<BundleValidation> {
    let started = Instant::now();
    let request = parse_request_bundle(bytes, adapter, accepted_types)?;
    debug!(
        bundle_type = %request.bundle_type,
        entries = request.entries.len(),
        "Request bundle passed structural checks"
    );
    cache.get()?;

    let mut entries = Vec::with_capacity(request.entries.len());
    for (index, entry) in request.entries.into_iter().enumerate() {
        let resource_bytes = serde_json::to_vec(&Value::Object(entry.resource))?;
        let result = validate_resource(
            cache,
            &resource_bytes,
            ResourceFormat::Json,
            &[],
            adapter,
            options,
        )?;
        debug!(
            index,
            full_url = entry.full_url.as_deref().unwrap_or(""),
            has_error = result.has_error(),
            "Validated bundle entry"
        );
        entries.push(BundleResponseEntry {
            full_url: entry.full_url,
            outcome: result.outcome,
        });
    }

    let bundle_bytes = serde_json::to_vec(&adapter.compose_bundle(&entries))?;
    info!(
        entries = entries.len(),
        bytes = bytes.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Validated bundle"
    );

    Ok(BundleValidation {
        bundle_bytes,
        entries,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::R4Adapter;
    use serde_json::json;

    fn batch() -> Vec<String> {
        vec!["batch".to_string()]
    }

    fn parse(value: Value) -> Result<RequestBundle, BundleError> {
        parse_request_bundle(&serde_json::to_vec(&value).unwrap(), &R4Adapter, &batch())
    }

    fn patient() -> Value {
        json!({"resourceType": "Patient"})
    }

    #[test]
    fn test_empty_batch() {
        let bundle = parse(json!({"resourceType": "Bundle", "type": "batch", "entry": []})).unwrap();
        assert!(bundle.entries.is_empty());

        let bundle = parse(json!({"resourceType": "Bundle", "type": "batch"})).unwrap();
        assert!(bundle.entries.is_empty());
    }

    #[test]
    fn test_malformed_input() {
        let result = parse_request_bundle(b"{not json", &R4Adapter, &batch());
        assert!(matches!(result, Err(BundleError::MalformedInput { .. })));

        let result = parse(json!([1, 2, 3]));
        match result {
            Err(BundleError::MalformedInput { reason }) => assert!(reason.contains("an array")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_resource_type_must_be_bundle() {
        assert_eq!(
            parse(json!({"resourceType": "Patient", "type": "batch"})).unwrap_err(),
            BundleError::InvalidResourceType {
                found: "Patient".to_string()
            }
        );
        assert!(matches!(
            parse(json!({"type": "batch"})),
            Err(BundleError::InvalidResourceType { .. })
        ));
    }

    #[test]
    fn test_bundle_type_must_be_accepted() {
        let err = parse(json!({"resourceType": "Bundle", "type": "transaction"})).unwrap_err();
        assert_eq!(
            err,
            BundleError::InvalidBundleType {
                found: Some("transaction".to_string()),
                accepted: batch(),
            }
        );

        assert!(matches!(
            parse(json!({"resourceType": "Bundle"})),
            Err(BundleError::InvalidBundleType { found: None, .. })
        ));
        assert!(matches!(
            parse(json!({"resourceType": "Bundle", "type": {"code": "batch"}})),
            Err(BundleError::InvalidBundleType { found: Some(_), .. })
        ));
    }

    #[test]
    fn test_transaction_accepted_when_configured() {
        let accepted = vec!["batch".to_string(), "transaction".to_string()];
        let bytes = serde_json::to_vec(&json!({"resourceType": "Bundle", "type": "transaction"})).unwrap();
        let bundle = parse_request_bundle(&bytes, &R4Adapter, &accepted).unwrap();
        assert_eq!(bundle.bundle_type, "transaction");
    }

    #[test]
    fn test_entry_must_be_array_of_objects() {
        assert_eq!(
            parse(json!({"resourceType": "Bundle", "type": "batch", "entry": {}})).unwrap_err(),
            BundleError::InvalidEntryList
        );
        assert_eq!(
            parse(json!({"resourceType": "Bundle", "type": "batch", "entry": [{"resource": patient()}, "x"]}))
                .unwrap_err(),
            BundleError::InvalidEntryShape { index: 1 }
        );
    }

    #[test]
    fn test_entry_resource_must_be_object() {
        assert_eq!(
            parse(json!({
                "resourceType": "Bundle",
                "type": "batch",
                "entry": [{"resource": patient()}, {"fullUrl": "urn:uuid:2"}]
            }))
            .unwrap_err(),
            BundleError::MissingEntryResource { index: 1 }
        );
        assert_eq!(
            parse(json!({
                "resourceType": "Bundle",
                "type": "batch",
                "entry": [{"resource": "Patient"}]
            }))
            .unwrap_err(),
            BundleError::MissingEntryResource { index: 0 }
        );
    }

    #[test]
    fn test_full_url_rules() {
        assert_eq!(
            parse(json!({
                "resourceType": "Bundle",
                "type": "batch",
                "entry": [{"fullUrl": 7, "resource": patient()}]
            }))
            .unwrap_err(),
            BundleError::InvalidFullUrl { index: 0 }
        );

        let bundle = parse(json!({
            "resourceType": "Bundle",
            "type": "batch",
            "entry": [
                {"fullUrl": null, "resource": patient()},
                {"fullUrl": null, "resource": patient()},
                {"fullUrl": "urn:uuid:a", "resource": patient()}
            ]
        }))
        .unwrap();
        assert_eq!(bundle.entries[0].full_url, None);
        assert_eq!(bundle.entries[2].full_url.as_deref(), Some("urn:uuid:a"));
    }

    #[test]
    fn test_duplicate_full_url_names_later_index() {
        let err = parse(json!({
            "resourceType": "Bundle",
            "type": "batch",
            "entry": [
                {"fullUrl": "urn:uuid:1", "resource": patient()},
                {"fullUrl": "urn:uuid:2", "resource": patient()},
                {"fullUrl": "urn:uuid:duplicate", "resource": patient()},
                {"fullUrl": "urn:uuid:duplicate", "resource": patient()}
            ]
        }))
        .unwrap_err();

        assert_eq!(
            err,
            BundleError::DuplicateFullUrl {
                index: 3,
                full_url: "urn:uuid:duplicate".to_string()
            }
        );
        assert!(err.to_string().contains("Bundle.entry[3]"));
    }

    #[test]
    fn test_first_violation_in_entry_order_wins() {
        let err = parse(json!({
            "resourceType": "Bundle",
            "type": "batch",
            "entry": [
                {"fullUrl": "urn:uuid:1", "resource": patient()},
                {"fullUrl": "urn:uuid:2"},
                {"fullUrl": "urn:uuid:1", "resource": patient()}
            ]
        }))
        .unwrap_err();
        assert_eq!(err, BundleError::MissingEntryResource { index: 1 });
    }
}
