//! Text formatters
//!
//! Non-string input is rendered to text first; `Missing` passes through.

use super::param;
use crate::value::Value;

fn map_text(value: &Value, f: impl FnOnce(&str) -> String) -> Value {
    if value.is_missing() {
        return Value::Missing;
    }
    Value::String(f(&value.render()))
}

pub(super) fn upper_case(value: &Value, _params: &[Value]) -> Value {
    map_text(value, str::to_uppercase)
}

pub(super) fn lower_case(value: &Value, _params: &[Value]) -> Value {
    map_text(value, str::to_lowercase)
}

pub(super) fn uc_first(value: &Value, _params: &[Value]) -> Value {
    map_text(value, |s| {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    })
}

pub(super) fn trim(value: &Value, _params: &[Value]) -> Value {
    map_text(value, |s| s.trim().to_string())
}

/// `substr(start, len)`, counted in characters
///
/// A negative start counts from the end; without `len` the rest is taken.
pub(super) fn substr(value: &Value, params: &[Value]) -> Value {
    if value.is_missing() {
        return Value::Missing;
    }

    let start = match param(params, 0) {
        Value::Missing => 0.0,
        p => match p.to_number() {
            Some(n) => n.trunc(),
            None => return Value::Missing,
        },
    };
    let len = match param(params, 1) {
        Value::Missing => None,
        p => match p.to_number() {
            Some(n) => Some(n.trunc().max(0.0) as usize),
            None => return Value::Missing,
        },
    };

    let text = value.render();
    let total = text.chars().count();
    let start = if start < 0.0 {
        total.saturating_sub((-start) as usize)
    } else {
        (start as usize).min(total)
    };

    let taken = text.chars().skip(start);
    let out = match len {
        Some(len) => taken.take(len).collect(),
        None => taken.collect(),
    };
    Value::String(out)
}

/// `replace(search, replacement)`: every occurrence
pub(super) fn replace(value: &Value, params: &[Value]) -> Value {
    let search = param(params, 0).render();
    let replacement = param(params, 1).render();
    map_text(value, |s| {
        if search.is_empty() {
            s.to_string()
        } else {
            s.replace(&search, &replacement)
        }
    })
}

/// `print(text)`: outputs its argument whatever the input
pub(super) fn print(_value: &Value, params: &[Value]) -> Value {
    param(params, 0).clone()
}
