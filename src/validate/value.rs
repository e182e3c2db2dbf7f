//! Declared parameter types and conversion into them.

use chrono::NaiveDate;
use serde_json::{Map, Number, Value};
use std::fmt;

const DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];

/// The type a validated parameter is converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Boolean,
    /// An integer when the text has no fraction, otherwise a float.
    Number,
    /// A 32-bit integer.
    Integer,
    Long,
    Float,
    /// `yyyy/mm/dd` or `yyyy-mm-dd`, normalized to `yyyy-mm-dd`.
    Date,
    Map,
    List,
}

impl ValueType {
    /// Resolves a type name. Unknown names are treated as `string`.
    pub fn from_name(name: &str) -> ValueType {
        match name.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => ValueType::Boolean,
            "number" => ValueType::Number,
            "integer" | "int" => ValueType::Integer,
            "long" => ValueType::Long,
            "float" | "double" => ValueType::Float,
            "date" => ValueType::Date,
            "map" => ValueType::Map,
            "list" | "array" => ValueType::List,
            _ => ValueType::String,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::Integer => "integer",
            ValueType::Long => "long",
            ValueType::Float => "float",
            ValueType::Date => "date",
            ValueType::Map => "map",
            ValueType::List => "list",
        }
    }

    pub(crate) fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueType::Number | ValueType::Integer | ValueType::Long | ValueType::Float
        )
    }

    /// Converts `value`, returning `None` when it cannot be represented.
    /// `Null` converts to `Null`.
    pub fn convert(self, value: &Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match self {
            ValueType::String => Some(Value::String(stringify(value))),
            ValueType::Boolean => to_bool(value).map(Value::Bool),
            ValueType::Number => to_number(value),
            ValueType::Integer => to_i64(value)
                .filter(|n| i32::MIN as i64 <= *n && *n <= i32::MAX as i64)
                .map(Value::from),
            ValueType::Long => to_i64(value).map(Value::from),
            ValueType::Float => to_f64(value)
                .and_then(Number::from_f64)
                .map(Value::Number),
            ValueType::Date => value
                .as_str()
                .and_then(parse_date)
                .map(|date| Value::String(date.format("%Y-%m-%d").to_string())),
            ValueType::Map => match value {
                Value::Object(_) => Some(value.clone()),
                Value::String(s) => serde_json::from_str::<Map<String, Value>>(s)
                    .ok()
                    .map(Value::Object),
                _ => None,
            },
            ValueType::List => match value {
                Value::Array(_) => Some(value.clone()),
                Value::String(s) => serde_json::from_str::<Vec<Value>>(s)
                    .ok()
                    .map(Value::Array),
                _ => None,
            },
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The string form of a value used by pattern checks and string conversion.
pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "on" | "yes" | "1" => Some(true),
            "false" | "f" | "off" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn to_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(n) => Some(Value::from(n)),
                Err(_) => s
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number),
            }
        }
        _ => None,
    }
}
