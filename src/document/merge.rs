//! Deep merge of scene documents.
//!
//! Merging is keyed on YAML node kind: scalars and sequences replace the
//! destination, mappings recurse, nulls leave the destination alone. A kind
//! mismatch is logged at notice level and the source wins. Sequences are
//! never concatenated.

use serde_yaml::Value;

use crate::document::scalar_text;
use crate::log;

/// YAML node kind, the granularity at which merge decisions are made.
fn node_kind(node: &Value) -> &'static str {
    match node {
        Value::Null => "null",
        Value::Bool(_) | Value::Number(_) | Value::String(_) => "scalar",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

/// Merge every field of `source` into `target`.
///
/// Both nodes must be mappings; anything else is a no-op. Keys absent from
/// `target` are inserted at the end, so repeated merges keep a stable key
/// order.
pub fn merge_map_fields(target: &mut Value, source: &Value) {
    let Some(source_map) = source.as_mapping() else {
        return;
    };
    let Some(target_map) = target.as_mapping_mut() else {
        return;
    };

    for (key, src) in source_map {
        let Some(dest) = target_map.get_mut(key) else {
            target_map.insert(key.clone(), src.clone());
            continue;
        };

        if node_kind(dest) != node_kind(src) {
            log!(
                "notice";
                "merging different node types under '{}'",
                scalar_text(key).unwrap_or_default()
            );
            *dest = src.clone();
            continue;
        }

        match dest {
            Value::Mapping(_) => merge_map_fields(dest, src),
            Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Sequence(_) => {
                *dest = src.clone();
            }
            // Null (and tagged) destinations are left untouched.
            _ => {}
        }
    }
}
