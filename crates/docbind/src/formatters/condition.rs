//! Comparison and conditional formatters

use super::param;
use crate::value::Value;
use std::cmp::Ordering;

pub(super) fn eq(value: &Value, params: &[Value]) -> Value {
    Value::Bool(value.loose_eq(param(params, 0)))
}

pub(super) fn ne(value: &Value, params: &[Value]) -> Value {
    Value::Bool(!value.loose_eq(param(params, 0)))
}

fn compare(value: &Value, params: &[Value], accept: fn(Ordering) -> bool) -> Value {
    Value::Bool(value.loose_cmp(param(params, 0)).is_some_and(accept))
}

pub(super) fn gt(value: &Value, params: &[Value]) -> Value {
    compare(value, params, Ordering::is_gt)
}

pub(super) fn lt(value: &Value, params: &[Value]) -> Value {
    compare(value, params, Ordering::is_lt)
}

pub(super) fn gte(value: &Value, params: &[Value]) -> Value {
    compare(value, params, Ordering::is_ge)
}

pub(super) fn lte(value: &Value, params: &[Value]) -> Value {
    compare(value, params, Ordering::is_le)
}

/// `ifTrue(then, else)`: picks an operand verbatim
pub(super) fn if_true(value: &Value, params: &[Value]) -> Value {
    if value.is_truthy() {
        param(params, 0).clone()
    } else {
        param(params, 1).clone()
    }
}

/// `ifEmpty(fallback)`: replaces a missing or empty value
pub(super) fn if_empty(value: &Value, params: &[Value]) -> Value {
    if value.is_empty() {
        param(params, 0).clone()
    } else {
        value.clone()
    }
}
