// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The field-extractor contract and the bundled JSON implementation.

use serde_json::Value;

/// A field value surfaced by an extractor, in its native representation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// The document lacks the field (or maps it to null).
    Missing,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bin(Vec<u8>),
}

/// The extractor could not process a document.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ExtractError {
    pub message: String,
}

/// Resolves a field path inside a raw document.
///
/// Implementations must be pure and thread-safe; the engine may call
/// them concurrently on different documents. A missing field is
/// [`FieldValue::Missing`], not an error; errors abort the whole batch.
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, doc: &[u8], field: &str) -> Result<FieldValue, ExtractError>;
}

/// Extractor for JSON documents backed by `serde_json`.
///
/// Field names starting with `/` are resolved as JSON pointers; bare
/// names look up top-level object keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor;

impl FieldExtractor for JsonExtractor {
    fn extract(&self, doc: &[u8], field: &str) -> Result<FieldValue, ExtractError> {
        let root: Value = serde_json::from_slice(doc).map_err(|e| ExtractError {
            message: format!("malformed JSON document: {e}"),
        })?;
        let node = if field.starts_with('/') {
            root.pointer(field)
        } else {
            root.get(field)
        };
        Ok(match node {
            None | Some(Value::Null) => FieldValue::Missing,
            Some(Value::Bool(b)) => FieldValue::Bool(*b),
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    FieldValue::UInt(u)
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Some(Value::String(s)) => FieldValue::Str(s.clone()),
            // Containers surface as their JSON text.
            Some(v) => FieldValue::Str(v.to_string()),
        })
    }
}
