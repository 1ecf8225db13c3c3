//! JSON ↔ Firestore typed-value conversion.
//!
//! The REST API wraps every value in a single-key object naming its type
//! (`{"stringValue": "x"}`, `{"mapValue": {"fields": {...}}}` ...). Integers
//! travel as decimal strings.

use serde_json::{json, Map, Number, Value as JsonValue};

use fortune_core::{Document, Error, Result};

/// Encode one JSON value as a Firestore `Value`.
pub fn encode_value(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Null => json!({ "nullValue": null }),
        JsonValue::Bool(b) => json!({ "booleanValue": b }),
        JsonValue::Number(n) => encode_number(n),
        JsonValue::String(s) => json!({ "stringValue": s }),
        JsonValue::Array(items) => {
            let values: Vec<JsonValue> = items.iter().map(encode_value).collect();
            if values.is_empty() {
                json!({ "arrayValue": {} })
            } else {
                json!({ "arrayValue": { "values": values } })
            }
        }
        JsonValue::Object(map) => json!({ "mapValue": { "fields": encode_map(map) } }),
    }
}

fn encode_number(n: &Number) -> JsonValue {
    if let Some(i) = n.as_i64() {
        json!({ "integerValue": i.to_string() })
    } else {
        // u64 above i64::MAX and every float
        json!({ "doubleValue": n.as_f64().unwrap_or(0.0) })
    }
}

fn encode_map(map: &Map<String, JsonValue>) -> JsonValue {
    let fields: Map<String, JsonValue> = map
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    JsonValue::Object(fields)
}

/// Encode a document's top-level fields into a Firestore `fields` object.
pub fn encode_fields(doc: &Document) -> JsonValue {
    encode_map(doc)
}

/// Decode a Firestore `Value` back into plain JSON.
///
/// Timestamps, references and bytes come back as strings.
pub fn decode_value(value: &JsonValue) -> Result<JsonValue> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Storage(format!("Firestore value is not an object: {}", value)))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| Error::Storage("Firestore value has no type tag".to_string()))?;

    match kind.as_str() {
        "nullValue" => Ok(JsonValue::Null),
        "booleanValue" => Ok(JsonValue::Bool(inner.as_bool().unwrap_or(false))),
        "integerValue" => decode_integer(inner),
        "doubleValue" => Ok(decode_double(inner)),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            Ok(JsonValue::String(inner.as_str().unwrap_or_default().to_string()))
        }
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = match inner.get("values").and_then(|v| v.as_array()) {
                Some(values) => values.iter().map(decode_value).collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            };
            Ok(JsonValue::Array(values))
        }
        "mapValue" => Ok(JsonValue::Object(decode_fields(
            inner.get("fields").unwrap_or(&JsonValue::Null),
        )?)),
        other => Err(Error::Storage(format!("Unsupported Firestore value type: {}", other))),
    }
}

fn decode_integer(inner: &JsonValue) -> Result<JsonValue> {
    let parsed = match inner {
        JsonValue::String(s) => s.parse::<i64>().ok(),
        JsonValue::Number(n) => n.as_i64(),
        _ => None,
    };
    parsed
        .map(|i| JsonValue::Number(i.into()))
        .ok_or_else(|| Error::Storage(format!("Malformed Firestore integer: {}", inner)))
}

fn decode_double(inner: &JsonValue) -> JsonValue {
    // NaN and the infinities arrive as strings and have no JSON form.
    inner
        .as_f64()
        .and_then(Number::from_f64)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

/// Decode a Firestore `fields` object. A missing object decodes as empty.
pub fn decode_fields(fields: &JsonValue) -> Result<Document> {
    match fields {
        JsonValue::Null => Ok(Document::new()),
        JsonValue::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
            .collect(),
        other => Err(Error::Storage(format!("Firestore fields is not an object: {}", other))),
    }
}

/// Quote a top-level field name for use in a field path.
///
/// Simple identifiers pass through; anything else is backtick-quoted.
pub fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}
