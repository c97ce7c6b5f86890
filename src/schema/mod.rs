//! Value types used when coercing action output.

mod time;
mod unicode_string;

pub use time::Time;
pub use unicode_string::UnicodeString;

use crate::errors::EngineError;
use chrono::{TimeZone, Utc};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Time,
    UnicodeString,
}

/// Coerces one output value; `null` passes through untouched.
pub fn coerce(value: &Value, primitive: Primitive) -> Result<Value, EngineError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match primitive {
        Primitive::Time => coerce_time(value),
        Primitive::UnicodeString => {
            let text = match value {
                Value::String(text) => UnicodeString::from(text.as_str()),
                other => UnicodeString::from(other.to_string()),
            };
            Ok(Value::String(text.into_string()))
        }
    }
}

fn coerce_time(value: &Value) -> Result<Value, EngineError> {
    let time = match value {
        Value::String(text) => Time::parse(text)?,
        Value::Number(number) => {
            let seconds = number
                .as_f64()
                .ok_or_else(|| EngineError::runtime("time value is not a finite number"))?;
            let micros = (seconds * 1_000_000.0).round() as i64;
            let instant = Utc
                .timestamp_micros(micros)
                .single()
                .ok_or_else(|| EngineError::runtime(format!("time out of range: {}", seconds)))?;
            Time::from(instant)
        }
        other => {
            return Err(EngineError::runtime(format!(
                "cannot coerce {} to a time",
                other
            )))
        }
    };
    Ok(Value::String(time.xmlschema()))
}

/// Applies field coercions to an object, or to every object of an array.
pub fn coerce_fields(value: Value, fields: &[(String, Primitive)]) -> Result<Value, EngineError> {
    if fields.is_empty() {
        return Ok(value);
    }
    match value {
        Value::Object(mut map) => {
            for (name, primitive) in fields {
                if let Some(entry) = map.get_mut(name) {
                    *entry = coerce(entry, *primitive)?;
                }
            }
            Ok(Value::Object(map))
        }
        Value::Array(items) => items
            .into_iter()
            .map(|item| coerce_fields(item, fields))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other),
    }
}
