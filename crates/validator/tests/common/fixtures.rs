//! Test fixtures.

use serde_json::{Value, json};

/// A patient with the given gender.
pub fn patient(gender: &str) -> Value {
    json!({
        "resourceType": "Patient",
        "gender": gender
    })
}

/// A patient with a fault-injection id.
pub fn scripted_patient(id: &str) -> Value {
    json!({
        "resourceType": "Patient",
        "id": id,
        "gender": "female"
    })
}

/// A batch bundle with the given entries.
pub fn batch(entries: Vec<Value>) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "batch",
        "entry": entries
    })
}

/// A bundle entry, with `fullUrl` when given.
pub fn entry(full_url: Option<&str>, resource: Value) -> Value {
    match full_url {
        Some(full_url) => json!({ "fullUrl": full_url, "resource": resource }),
        None => json!({ "resource": resource }),
    }
}

/// Serializes a fixture.
pub fn bytes(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).expect("fixture serializes")
}
