//! Forbidden-character codec for NGSI attribute values.
//!
//! Orion rejects `< > " ' = ; ( )` inside attribute values. With `forbidden`
//! enabled, string leaves are percent-escaped on the way out and restored on
//! the way back. `%` is escaped too, which keeps the mapping a bijection.

use serde_json::{Map, Value};

use super::request::RequestBody;

const ESCAPES: [(char, &str); 9] = [
    ('%', "%25"),
    ('<', "%3C"),
    ('>', "%3E"),
    ('"', "%22"),
    ('\'', "%27"),
    ('=', "%3D"),
    (';', "%3B"),
    ('(', "%28"),
    (')', "%29"),
];

fn escape(c: char) -> Option<&'static str> {
    ESCAPES.iter().find(|(ch, _)| *ch == c).map(|(_, code)| *code)
}

fn unescape(code: &str) -> Option<char> {
    ESCAPES.iter().find(|(_, esc)| esc.eq_ignore_ascii_case(code)).map(|(ch, _)| *ch)
}

/// Escape every reserved character of `s`.
pub fn encode_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match escape(c) {
            Some(code) => out.push_str(code),
            None => out.push(c),
        }
    }
    out
}

/// Restore reserved characters; unknown `%xx` sequences are left as they are.
pub fn decode_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match tail.get(..3).and_then(unescape) {
            Some(c) => {
                out.push(c);
                rest = &tail[3..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn map_strings(
    value: &Value,
    f: &dyn Fn(&str) -> String,
) -> Value {
    match value {
        Value::String(s) => Value::String(f(s)),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| map_strings(v, f)).collect()),
        Value::Object(obj) => Value::Object(obj.iter().map(|(k, v)| (k.clone(), map_strings(v, f))).collect()),
        _ => value.clone(),
    }
}

/// Encode every string leaf of `value` when `forbidden` is set.
pub fn encode_value(
    value: &Value,
    forbidden: bool,
) -> Value {
    if !forbidden {
        return value.clone();
    }
    map_strings(value, &encode_str)
}

/// Decode every string leaf of `value` when `forbidden` is set.
pub fn decode_value(
    value: &Value,
    forbidden: bool,
) -> Value {
    if !forbidden {
        return value.clone();
    }
    map_strings(value, &decode_str)
}

fn map_attribute(
    attr: &Value,
    f: &dyn Fn(&Value) -> Value,
) -> Value {
    let Value::Object(obj) = attr else {
        return f(attr);
    };

    let mut out = Map::with_capacity(obj.len());
    for (key, val) in obj {
        let mapped = match key.as_str() {
            "value" => f(val),
            "metadata" => match val {
                Value::Object(metadata) => Value::Object(metadata.iter().map(|(name, meta)| (name.clone(), map_attribute(meta, f))).collect()),
                _ => val.clone(),
            },
            _ => val.clone(),
        };
        out.insert(key.clone(), mapped);
    }
    Value::Object(out)
}

fn map_entities(
    value: &Value,
    key_values: bool,
    f: &dyn Fn(&Value) -> Value,
) -> Value {
    match value {
        Value::Array(arr) => Value::Array(arr.iter().map(|v| map_entities(v, key_values, f)).collect()),
        Value::Object(obj) => {
            let mut out = Map::with_capacity(obj.len());
            for (key, val) in obj {
                let mapped = match key.as_str() {
                    "id" | "type" => val.clone(),
                    _ if key_values => f(val),
                    _ => map_attribute(val, f),
                };
                out.insert(key.clone(), mapped);
            }
            Value::Object(out)
        }
        _ => f(value),
    }
}

/// Encode the attribute values of one entity or an array of entities.
///
/// `id` and `type` are left untouched. In normalized form only `value`
/// fields (including metadata values) are encoded; with `key_values` every
/// other property is an attribute value.
pub fn encode_entities(
    value: &Value,
    forbidden: bool,
    key_values: bool,
) -> Value {
    if !forbidden {
        return value.clone();
    }
    map_entities(value, key_values, &|v| encode_value(v, true))
}

/// Inverse of [`encode_entities`].
pub fn decode_entities(
    value: &Value,
    forbidden: bool,
    key_values: bool,
) -> Value {
    if !forbidden {
        return value.clone();
    }
    map_entities(value, key_values, &|v| decode_value(v, true))
}

/// Encode a map of attributes (`{name: {type, value, metadata}}`), as sent
/// to `/v2/entities/{id}/attrs`.
pub fn encode_attributes(
    value: &Value,
    forbidden: bool,
    key_values: bool,
) -> Value {
    encode_entities(value, forbidden, key_values)
}

/// Encode a bare attribute (`{type, value, metadata}`): every string of its
/// value, and the value of each metadata entry.
pub fn encode_attribute(
    attr: &Value,
    forbidden: bool,
) -> Value {
    if !forbidden {
        return attr.clone();
    }
    map_attribute(attr, &|v| encode_value(v, true))
}

/// Inverse of [`encode_attribute`].
pub fn decode_attribute(
    attr: &Value,
    forbidden: bool,
) -> Value {
    if !forbidden {
        return attr.clone();
    }
    map_attribute(attr, &|v| decode_value(v, true))
}

/// Body for an unstructured attribute value write (`PUT .../attrs/{name}/value`).
///
/// Scalars are sent as `text/plain`: booleans and numbers verbatim, strings
/// quoted, null as `null`. Objects and arrays go out as JSON.
pub fn stringify(value: &Value) -> RequestBody {
    match value {
        Value::Bool(b) => RequestBody::Text(b.to_string()),
        Value::Number(n) => RequestBody::Text(n.to_string()),
        Value::String(s) => RequestBody::Text(format!("\"{}\"", s)),
        Value::Null => RequestBody::Text("null".to_string()),
        Value::Array(_) | Value::Object(_) => RequestBody::Json(value.clone()),
    }
}
