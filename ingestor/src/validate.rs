use crate::errors::{Error, Result};
use crate::model::Reading;
use serde_json::{Map, Value};

/// Parses a request body into a typed reading.
///
/// Keys are checked in the order `hive_id`, `temperature`, `humidity`,
/// `audio`, `bee_count`; the first missing or mistyped one is reported.
/// Unknown keys are ignored.
pub fn parse_reading(body: &[u8]) -> Result<Reading> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| Error::MalformedPayload(format!("invalid JSON: {}", e)))?;

    let object = match value {
        Value::Object(map) => map,
        other => {
            return Err(Error::MalformedPayload(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            )))
        }
    };

    Ok(Reading {
        hive_id: string_field(&object, "hive_id")?,
        temperature: float_field(&object, "temperature")?,
        humidity: float_field(&object, "humidity")?,
        audio: float_field(&object, "audio")?,
        bee_count: integer_field(&object, "bee_count")?,
    })
}

fn lookup<'a>(object: &'a Map<String, Value>, key: &'static str) -> Result<&'a Value> {
    object.get(key).ok_or(Error::MissingField(key))
}

fn string_field(object: &Map<String, Value>, key: &'static str) -> Result<String> {
    match lookup(object, key)? {
        // A line break would split the line-protocol record
        Value::String(s) if s.contains(|c: char| c == '\n' || c == '\r') => {
            Err(Error::InvalidField {
                field: key,
                expected: "a single-line string",
            })
        }
        // A trailing backslash would escape the tag/field separator
        Value::String(s) if s.ends_with('\\') => Err(Error::InvalidField {
            field: key,
            expected: "a string not ending in a backslash",
        }),
        Value::String(s) => Ok(s.clone()),
        _ => Err(Error::InvalidField {
            field: key,
            expected: "a string",
        }),
    }
}

/// `30` and `30.5` both become floats.
fn float_field(object: &Map<String, Value>, key: &'static str) -> Result<f64> {
    match lookup(object, key)? {
        Value::Number(n) => n.as_f64().ok_or(Error::InvalidField {
            field: key,
            expected: "a finite number",
        }),
        _ => Err(Error::InvalidField {
            field: key,
            expected: "a number",
        }),
    }
}

/// Accepts `142` and `142.0`, rejects `142.5`.
fn integer_field(object: &Map<String, Value>, key: &'static str) -> Result<i64> {
    let invalid = Error::InvalidField {
        field: key,
        expected: "an integer",
    };
    match lookup(object, key)? {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(i),
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                    Ok(f as i64)
                }
                _ => Err(invalid),
            },
        },
        _ => Err(invalid),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
