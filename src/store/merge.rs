//! Deep-merge algorithm for stored-request/impression templates
//! (spec.md §4.1, §9 "Deep-merge of heterogeneous JSON").
//!
//! Rule set, applied uniformly rather than via ad-hoc per-field code
//! paths (spec.md §9):
//! - two maps recurse key-wise;
//! - any other pairing (scalar, array, or a map vs. non-map) replaces
//!   the stored value with the incoming one;
//! - the single documented exception is the top-level `imp` array, which
//!   is merged per-element by matching `imp.ext.prebid.storedrequest.id`
//!   against a caller-supplied map of stored impression templates. A
//!   missing stored impression produces a warning, not an error; the
//!   incoming impression passes through unchanged.

use crate::rtb::BidRequest;
use serde_json::Value;
use std::collections::HashMap;

/// Recursively merges `incoming` over `stored`. Two objects recurse
/// key-wise; anything else (scalars, arrays, object/non-object
/// mismatches) lets `incoming` win outright.
pub fn merge_json(stored: &Value, incoming: &Value) -> Value {
    match (stored, incoming) {
        (Value::Object(stored_map), Value::Object(incoming_map)) => {
            let mut merged = stored_map.clone();
            for (key, incoming_val) in incoming_map {
                let merged_val = match merged.get(key) {
                    Some(stored_val) => merge_json(stored_val, incoming_val),
                    None => incoming_val.clone(),
                };
                merged.insert(key.clone(), merged_val);
            }
            Value::Object(merged)
        }
        _ => incoming.clone(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub merged: BidRequest,
    pub stored_request_id: Option<String>,
    pub stored_imp_ids: HashMap<String, String>,
    pub warnings: Vec<String>,
}

/// Merges an incoming request against a stored request template and a
/// per-impression map of stored templates keyed by stored-imp-id.
/// `stored_imps` is looked up by the stored id referenced from each
/// incoming impression's `ext.prebid.storedrequest.id`, not by the
/// incoming impression's own id.
pub fn merge_request(
    incoming: &BidRequest,
    stored_request: Option<Value>,
    stored_imps: &HashMap<String, Value>,
) -> Result<MergeOutcome, anyhow::Error> {
    let incoming_value = serde_json::to_value(incoming)?;

    let stored_request_id = incoming.stored_ref().map(|r| r.id);

    let mut base = match &stored_request {
        Some(stored) => merge_json(stored, &incoming_value),
        None => incoming_value.clone(),
    };

    let mut warnings = Vec::new();
    let mut stored_imp_ids = HashMap::new();

    if let Some(imp_array) = incoming_value.get("imp").and_then(Value::as_array) {
        let mut merged_imps = Vec::with_capacity(imp_array.len());

        for imp in imp_array {
            let stored_imp_id = imp
                .get("ext")
                .and_then(|e| e.get("prebid"))
                .and_then(|p| p.get("storedrequest"))
                .and_then(|s| s.get("id"))
                .and_then(Value::as_str)
                .map(str::to_string);

            let merged_imp = match &stored_imp_id {
                Some(stored_id) => match stored_imps.get(stored_id) {
                    Some(stored_imp) => {
                        let imp_id = imp
                            .get("id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        stored_imp_ids.insert(imp_id, stored_id.clone());
                        merge_json(stored_imp, imp)
                    }
                    None => {
                        warnings.push(format!(
                            "stored impression '{}' not found; passing incoming impression through",
                            stored_id
                        ));
                        imp.clone()
                    }
                },
                None => imp.clone(),
            };

            merged_imps.push(merged_imp);
        }

        if let Value::Object(ref mut map) = base {
            map.insert("imp".to_string(), Value::Array(merged_imps));
        }
    }

    let merged: BidRequest = serde_json::from_value(base)?;

    Ok(MergeOutcome {
        merged,
        stored_request_id,
        stored_imp_ids,
        warnings,
    })
}
