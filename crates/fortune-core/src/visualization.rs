//! Storage encoding for the face visualization payload.
//!
//! Document stores reject nested arrays and some key characters, so the
//! payload is normalized before it is persisted:
//!
//! - map keys containing `. / * [ ] ~` get those characters replaced by `_`
//! - floating-point numbers are rounded to five decimals
//! - `landmarks` ordered pairs `[x, y]` become `{"x": x, "y": y}`
//!
//! [`decode_from_storage`] turns landmarks back into ordered pairs.

use serde_json::{Map, Number, Value as JsonValue};

const LANDMARKS: &str = "landmarks";
const FLOAT_SCALE: f64 = 100_000.0;

fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| match c {
            '.' | '/' | '*' | '[' | ']' | '~' => '_',
            other => other,
        })
        .collect();
    if cleaned.is_empty() {
        "field".to_string()
    } else {
        cleaned
    }
}

fn round_float(value: f64) -> JsonValue {
    if !value.is_finite() {
        return JsonValue::Null;
    }
    let rounded = (value * FLOAT_SCALE).round() / FLOAT_SCALE;
    Number::from_f64(rounded)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

/// Normalize keys and numbers recursively.
pub fn sanitize(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (sanitize_key(k), sanitize(v)))
                .collect(),
        ),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sanitize).collect()),
        JsonValue::Number(n) if n.is_f64() => n.as_f64().map(round_float).unwrap_or(JsonValue::Null),
        other => other.clone(),
    }
}

fn point(x: &JsonValue, y: &JsonValue) -> JsonValue {
    let mut map = Map::new();
    map.insert("x".to_string(), x.clone());
    map.insert("y".to_string(), y.clone());
    JsonValue::Object(map)
}

/// Convert the client payload into its storage form.
pub fn encode_for_storage(value: &JsonValue) -> JsonValue {
    let mut sanitized = sanitize(value);
    if let Some(JsonValue::Array(landmarks)) = sanitized
        .as_object_mut()
        .and_then(|map| map.get_mut(LANDMARKS))
    {
        let converted = landmarks
            .iter()
            .filter_map(|p| match p {
                JsonValue::Array(pair) if pair.len() >= 2 => Some(point(&pair[0], &pair[1])),
                JsonValue::Object(m) => match (m.get("x"), m.get("y")) {
                    (Some(x), Some(y)) => Some(point(x, y)),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        *landmarks = converted;
    }
    sanitized
}

/// Convert a stored payload back into the shape clients render.
pub fn decode_from_storage(value: &JsonValue) -> JsonValue {
    let mut decoded = value.clone();
    if let Some(JsonValue::Array(landmarks)) = decoded
        .as_object_mut()
        .and_then(|map| map.get_mut(LANDMARKS))
    {
        let converted = landmarks
            .iter()
            .filter_map(|p| {
                let m = p.as_object()?;
                match (m.get("x"), m.get("y")) {
                    (Some(x), Some(y)) => Some(JsonValue::Array(vec![x.clone(), y.clone()])),
                    _ => None,
                }
            })
            .collect();
        *landmarks = converted;
    }
    decoded
}

/// Number of landmarks in a client payload, for logging.
pub fn landmark_count(value: &JsonValue) -> usize {
    value
        .get(LANDMARKS)
        .and_then(|l| l.as_array())
        .map(|l| l.len())
        .unwrap_or(0)
}
