//! Aggregation formatters
//!
//! Each receives the per-element values of an array with `Missing` entries
//! already removed. Sum, average and extrema look only at values that coerce
//! to numbers; count takes every value.

use crate::value::Value;

fn numbers(values: &[Value]) -> Vec<f64> {
    values.iter().filter_map(Value::to_number).collect()
}

pub(super) fn sum(values: &[Value]) -> Value {
    Value::number(numbers(values).iter().sum())
}

pub(super) fn avg(values: &[Value]) -> Value {
    let numbers = numbers(values);
    if numbers.is_empty() {
        return Value::Number(0.0);
    }
    Value::number(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

pub(super) fn count(values: &[Value]) -> Value {
    Value::Number(values.len() as f64)
}

pub(super) fn min(values: &[Value]) -> Value {
    Value::Number(numbers(values).into_iter().reduce(f64::min).unwrap_or(0.0))
}

pub(super) fn max(values: &[Value]) -> Value {
    Value::Number(numbers(values).into_iter().reduce(f64::max).unwrap_or(0.0))
}
