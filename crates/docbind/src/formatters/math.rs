//! Arithmetic formatters
//!
//! Operands are coerced with [`Value::to_number`]; anything that does not
//! coerce makes the result `Missing`.

use super::param;
use crate::value::Value;

fn binary(value: &Value, params: &[Value], op: impl FnOnce(f64, f64) -> Option<f64>) -> Value {
    match (value.to_number(), param(params, 0).to_number()) {
        (Some(a), Some(b)) => op(a, b).map(Value::number).unwrap_or_default(),
        _ => Value::Missing,
    }
}

fn unary(value: &Value, op: impl FnOnce(f64) -> f64) -> Value {
    value
        .to_number()
        .map(|n| Value::number(op(n)))
        .unwrap_or_default()
}

/// Optional integer parameter; `None` when present but not numeric
fn decimals(params: &[Value], default: i32) -> Option<i32> {
    match param(params, 0) {
        Value::Missing => Some(default),
        p => p.to_number().map(|n| n.trunc().clamp(0.0, 15.0) as i32),
    }
}

pub(super) fn add(value: &Value, params: &[Value]) -> Value {
    binary(value, params, |a, b| Some(a + b))
}

pub(super) fn sub(value: &Value, params: &[Value]) -> Value {
    binary(value, params, |a, b| Some(a - b))
}

pub(super) fn mul(value: &Value, params: &[Value]) -> Value {
    binary(value, params, |a, b| Some(a * b))
}

pub(super) fn div(value: &Value, params: &[Value]) -> Value {
    binary(value, params, |a, b| (b != 0.0).then(|| a / b))
}

/// `round(decimals = 0)`, half away from zero
pub(super) fn round(value: &Value, params: &[Value]) -> Value {
    let Some(places) = decimals(params, 0) else {
        return Value::Missing;
    };
    unary(value, |n| round_to(n, places))
}

pub(super) fn abs(value: &Value, _params: &[Value]) -> Value {
    unary(value, f64::abs)
}

pub(super) fn ceil(value: &Value, _params: &[Value]) -> Value {
    unary(value, f64::ceil)
}

pub(super) fn floor(value: &Value, _params: &[Value]) -> Value {
    unary(value, f64::floor)
}

/// `formatN(decimals = 2)`: grouped thousands, fixed decimals
pub(super) fn format_n(value: &Value, params: &[Value]) -> Value {
    let Some(places) = decimals(params, 2) else {
        return Value::Missing;
    };
    value
        .to_number()
        .map(|n| Value::String(format_grouped(n, places as usize)))
        .unwrap_or_default()
}

fn round_to(n: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (n * factor).round() / factor
}

/// Format with `,` thousands separators and `decimals` fixed decimals
pub fn format_grouped(n: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, round_to(n.abs(), decimals as i32));
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let negative = n < 0.0 && fixed.bytes().any(|b| matches!(b, b'1'..=b'9'));
    let sign = if negative { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}
