//! Structured documents exchanged on the wire and persisted in the metadata store
//!
//! A [`Document`] is an insertion-ordered map of field names to JSON values.
//! A few extended values are encoded the way extended JSON does it:
//! `{"$timestamp": {"t": secs, "i": inc}}`, `{"$minKey": 1}` and `{"$maxKey": 1}`.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::common::ParseError;

pub type Document = Map<String, Value>;

const MIN_KEY: &str = "$minKey";
const MAX_KEY: &str = "$maxKey";

/// Kinds a field can be required to have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Object,
    String,
    Number,
    Timestamp,
}

impl ValueKind {
    fn name(self) -> &'static str {
        match self {
            ValueKind::Object => "object",
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Timestamp => "timestamp",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            ValueKind::Object => value.is_object() && !is_timestamp(value),
            ValueKind::String => value.is_string(),
            ValueKind::Number => value.is_number(),
            ValueKind::Timestamp => is_timestamp(value),
        }
    }
}

/// Look up `field` and require it to be of `kind`.
pub fn extract_typed_field<'a>(
    doc: &'a Document,
    field: &str,
    kind: ValueKind,
) -> Result<&'a Value, ParseError> {
    let value = doc
        .get(field)
        .ok_or_else(|| ParseError::MissingField(field.to_string()))?;
    if !kind.matches(value) {
        return Err(ParseError::TypeMismatch {
            field: field.to_string(),
            expected: kind.name(),
        });
    }
    Ok(value)
}

pub fn extract_string_field<'a>(doc: &'a Document, field: &str) -> Result<&'a str, ParseError> {
    extract_typed_field(doc, field, ValueKind::String).map(|v| v.as_str().unwrap_or_default())
}

pub fn extract_object_field<'a>(
    doc: &'a Document,
    field: &str,
) -> Result<&'a Document, ParseError> {
    match extract_typed_field(doc, field, ValueKind::Object)?.as_object() {
        Some(obj) => Ok(obj),
        None => Err(ParseError::TypeMismatch {
            field: field.to_string(),
            expected: "object",
        }),
    }
}

pub fn extract_u32_field(doc: &Document, field: &str) -> Result<u32, ParseError> {
    extract_typed_field(doc, field, ValueKind::Number)?
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| ParseError::TypeMismatch {
            field: field.to_string(),
            expected: "u32",
        })
}

pub fn timestamp_value(secs: u32, inc: u32) -> Value {
    serde_json::json!({ "$timestamp": { "t": secs, "i": inc } })
}

pub fn is_timestamp(value: &Value) -> bool {
    as_timestamp_parts(value).is_some()
}

/// Decode `{"$timestamp": {"t", "i"}}` into `(secs, inc)`
pub fn as_timestamp_parts(value: &Value) -> Option<(u32, u32)> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    let inner = obj.get("$timestamp")?.as_object()?;
    let t = u32::try_from(inner.get("t")?.as_u64()?).ok()?;
    let i = u32::try_from(inner.get("i")?.as_u64()?).ok()?;
    Some((t, i))
}

pub fn min_key() -> Value {
    serde_json::json!({ "$minKey": 1 })
}

pub fn max_key() -> Value {
    serde_json::json!({ "$maxKey": 1 })
}

fn is_marker(value: &Value, marker: &str) -> bool {
    value
        .as_object()
        .map(|o| o.len() == 1 && o.contains_key(marker))
        .unwrap_or(false)
}

pub fn is_min_key(value: &Value) -> bool {
    is_marker(value, MIN_KEY)
}

pub fn is_max_key(value: &Value) -> bool {
    is_marker(value, MAX_KEY)
}

/// Canonical type rank used by the key ordering
fn type_rank(value: &Value) -> u8 {
    if is_min_key(value) {
        return 0;
    }
    if is_max_key(value) {
        return 255;
    }
    match value {
        Value::Null => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Object(_) if is_timestamp(value) => 6,
        Value::Object(_) => 4,
        Value::Array(_) => 5,
        Value::Bool(_) => 7,
    }
}

fn compare_numbers(a: &serde_json::Number, b: &serde_json::Number) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x.cmp(&y);
    }
    let x = a.as_f64().unwrap_or(f64::NAN);
    let y = b.as_f64().unwrap_or(f64::NAN);
    x.total_cmp(&y)
}

/// Total order over key values
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| compare_values(l, r))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(_), Value::Object(_)) if ra == 6 => {
            as_timestamp_parts(a).cmp(&as_timestamp_parts(b))
        }
        (Value::Object(x), Value::Object(y)) => compare_documents(x, y),
        _ => Ordering::Equal,
    }
}

/// Compare two key documents field by field in order, then by length.
pub fn compare_documents(a: &Document, b: &Document) -> Ordering {
    a.values()
        .zip(b.values())
        .map(|(l, r)| compare_values(l, r))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}
