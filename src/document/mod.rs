//! Scene document tree and scalar helpers.
//!
//! A scene document is a YAML tree (`serde_yaml::Value`). Mappings iterate
//! in insertion order, which is what makes the merge deterministic. The
//! helpers here cover the operations the resolver needs: parsing, scalar
//! text access, tentative bool/number decoding, and key removal.

pub mod merge;

use anyhow::{Context, Result};
use serde_yaml::Value;

/// A parsed scene document tree.
pub type Document = Value;

/// Parse a scene document from text.
pub fn parse_document(text: &str) -> Result<Document> {
    serde_yaml::from_str(text).context("parsing scene document")
}

/// Check if a node is a scalar (string, number, or bool).
#[inline]
pub fn is_scalar(node: &Value) -> bool {
    matches!(node, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Get the textual form of a scalar node.
pub fn scalar_text(node: &Value) -> Option<String> {
    match node {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Tentatively decode a scalar as a bool.
///
/// Typed bools decode trivially; string scalars are matched against the
/// YAML 1.1 boolean literals so that a quoted `"true"` or `"off"` is still
/// recognized.
pub fn decodes_as_bool(node: &Value) -> bool {
    match node {
        Value::Bool(_) => true,
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "false" | "yes" | "no" | "on" | "off"
        ),
        _ => false,
    }
}

/// Tentatively decode a scalar as a number.
pub fn decodes_as_number(node: &Value) -> bool {
    match node {
        Value::Number(_) => true,
        Value::String(s) => {
            let trimmed = s.trim();
            !trimmed.is_empty() && trimmed.parse::<f64>().is_ok()
        }
        _ => false,
    }
}

/// Remove a key from a mapping node, preserving the order of the rest.
pub fn remove_key(doc: &mut Document, key: &str) -> Option<Document> {
    let key = Value::String(key.to_string());
    doc.as_mapping_mut()?.shift_remove(&key)
}
