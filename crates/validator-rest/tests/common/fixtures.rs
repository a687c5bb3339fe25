//! Request fixtures.

use serde_json::{Value, json};

/// A patient with the given gender.
pub fn patient(gender: &str) -> Value {
    json!({
        "resourceType": "Patient",
        "gender": gender
    })
}

/// A batch bundle with one entry per `(fullUrl, resource)` pair.
pub fn batch(entries: Vec<(&str, Value)>) -> Value {
    let entries: Vec<Value> = entries
        .into_iter()
        .map(|(full_url, resource)| json!({ "fullUrl": full_url, "resource": resource }))
        .collect();
    json!({
        "resourceType": "Bundle",
        "type": "batch",
        "entry": entries
    })
}
