//! Resolved values and coercion rules
//!
//! Everything the processor hands to the renderer is a [`Value`]. Input data
//! stays a `serde_json::Value` tree; nested structures never survive past
//! path resolution.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A resolved tag value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Path resolution failed somewhere, or an operation had no result
    #[default]
    Missing,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Value {
    /// Convert a JSON data node into a resolved value
    ///
    /// `null` and empty containers become [`Value::Missing`]; non-empty
    /// containers are kept as their compact JSON text.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Missing,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::number).unwrap_or_default(),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(a) if a.is_empty() => Value::Missing,
            serde_json::Value::Object(o) if o.is_empty() => Value::Missing,
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Value::String(json.to_string())
            }
        }
    }

    /// Build a number, mapping non-finite results to `Missing`
    pub fn number(n: f64) -> Self {
        if n.is_finite() {
            Value::Number(n)
        } else {
            Value::Missing
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Numeric coercion
    ///
    /// Strings are trimmed and parsed; booleans count as 1/0. Anything that
    /// does not produce a finite number yields `None`.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Missing => None,
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Some(*n),
            Value::String(s) => parse_number(s),
        }
    }

    /// Boolean coercion: `Missing`, `""`, `0` and `false` are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Missing => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
        }
    }

    /// Emptiness as used by `ifEmpty`: only `Missing` and the empty string
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::String(s) => s.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }

    /// Text form used for substitution and by text formatters
    pub fn render(&self) -> String {
        match self {
            Value::Missing => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
        }
    }

    /// Loose equality: numeric when both sides coerce, textual otherwise
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Missing, Value::Missing) => true,
            (Value::Missing, _) | (_, Value::Missing) => false,
            _ => match (self.to_number(), other.to_number()) {
                (Some(a), Some(b)) => a == b,
                _ => self.render() == other.render(),
            },
        }
    }

    /// Ordering used by `gt`/`lt`/`gte`/`lte`; `None` when either side is missing
    pub fn loose_cmp(&self, other: &Value) -> Option<Ordering> {
        if self.is_missing() || other.is_missing() {
            return None;
        }
        match (self.to_number(), other.to_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => Some(self.render().cmp(&other.render())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Parse a user-supplied numeric string
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    // Rust accepts "inf"/"nan" spellings; data never means those
    if !text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Canonical decimal form: shortest round-trip, no trailing `.0`
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // also folds -0
        return "0".to_string();
    }
    n.to_string()
}
