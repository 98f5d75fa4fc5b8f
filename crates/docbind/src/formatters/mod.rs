//! Formatter registry
//!
//! A fixed catalog of named value transforms, built once on first use and
//! read-only afterwards. Dynamic parameters are resolved by the processor
//! before a formatter is called, so every formatter is a pure function of
//! its input value and parameter values.

mod aggregate;
mod condition;
mod math;
mod text;

use crate::value::Value;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub use math::format_grouped;

/// Transform applied to one value
pub type ScalarFn = fn(&Value, &[Value]) -> Value;

/// Reduction over the non-missing per-element values of an array
pub type AggregateFn = fn(&[Value]) -> Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatterCategory {
    Text,
    Math,
    Comparison,
    Aggregation,
}

impl fmt::Display for FormatterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatterCategory::Text => "text",
            FormatterCategory::Math => "math",
            FormatterCategory::Comparison => "comparison",
            FormatterCategory::Aggregation => "aggregation",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy)]
pub enum FormatterKind {
    Scalar(ScalarFn),
    Aggregate(AggregateFn),
}

/// A registered formatter
#[derive(Clone, Copy)]
pub struct Formatter {
    pub name: &'static str,
    pub category: FormatterCategory,
    pub kind: FormatterKind,
}

impl Formatter {
    fn scalar(name: &'static str, category: FormatterCategory, f: ScalarFn) -> Self {
        Self {
            name,
            category,
            kind: FormatterKind::Scalar(f),
        }
    }

    fn aggregate(name: &'static str, f: AggregateFn) -> Self {
        Self {
            name,
            category: FormatterCategory::Aggregation,
            kind: FormatterKind::Aggregate(f),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, FormatterKind::Aggregate(_))
    }

    /// Apply to a single value
    ///
    /// Aggregation formatters have no single-value meaning and pass the
    /// input through.
    pub fn apply(&self, value: &Value, params: &[Value]) -> Value {
        match self.kind {
            FormatterKind::Scalar(f) => f(value, params),
            FormatterKind::Aggregate(_) => value.clone(),
        }
    }

    /// Reduce a list of per-element values; `None` for non-aggregation formatters
    pub fn reduce(&self, values: &[Value]) -> Option<Value> {
        match self.kind {
            FormatterKind::Aggregate(f) => Some(f(values)),
            FormatterKind::Scalar(_) => None,
        }
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatter")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish()
    }
}

/// Name-keyed formatter catalog
pub struct FormatterRegistry {
    formatters: HashMap<&'static str, Formatter>,
}

impl FormatterRegistry {
    fn builtin() -> Self {
        use FormatterCategory::*;

        let all = [
            // Text
            Formatter::scalar("upperCase", Text, text::upper_case),
            Formatter::scalar("lowerCase", Text, text::lower_case),
            Formatter::scalar("ucFirst", Text, text::uc_first),
            Formatter::scalar("trim", Text, text::trim),
            Formatter::scalar("substr", Text, text::substr),
            Formatter::scalar("replace", Text, text::replace),
            Formatter::scalar("print", Text, text::print),
            // Math
            Formatter::scalar("add", Math, math::add),
            Formatter::scalar("sub", Math, math::sub),
            Formatter::scalar("mul", Math, math::mul),
            Formatter::scalar("div", Math, math::div),
            Formatter::scalar("round", Math, math::round),
            Formatter::scalar("abs", Math, math::abs),
            Formatter::scalar("ceil", Math, math::ceil),
            Formatter::scalar("floor", Math, math::floor),
            Formatter::scalar("formatN", Math, math::format_n),
            // Comparison / conditional
            Formatter::scalar("eq", Comparison, condition::eq),
            Formatter::scalar("ne", Comparison, condition::ne),
            Formatter::scalar("gt", Comparison, condition::gt),
            Formatter::scalar("lt", Comparison, condition::lt),
            Formatter::scalar("gte", Comparison, condition::gte),
            Formatter::scalar("lte", Comparison, condition::lte),
            Formatter::scalar("ifTrue", Comparison, condition::if_true),
            Formatter::scalar("ifEmpty", Comparison, condition::if_empty),
            // Aggregation
            Formatter::aggregate("aggSum", aggregate::sum),
            Formatter::aggregate("aggAvg", aggregate::avg),
            Formatter::aggregate("aggCount", aggregate::count),
            Formatter::aggregate("aggMin", aggregate::min),
            Formatter::aggregate("aggMax", aggregate::max),
        ];

        Self {
            formatters: all.into_iter().map(|f| (f.name, f)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Formatter> {
        self.formatters.get(name)
    }

    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }

    /// All formatters sorted by category, then name
    pub fn list(&self) -> Vec<&Formatter> {
        let mut list: Vec<_> = self.formatters.values().collect();
        list.sort_by_key(|f| (f.category as u8, f.name));
        list
    }
}

static REGISTRY: Lazy<FormatterRegistry> = Lazy::new(FormatterRegistry::builtin);

/// The process-wide registry
pub fn registry() -> &'static FormatterRegistry {
    &REGISTRY
}

/// Look up a formatter by name
pub fn lookup(name: &str) -> Option<&'static Formatter> {
    REGISTRY.get(name)
}

/// Registered names, sorted
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<_> = REGISTRY.formatters.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Parameter `i`, or `Missing` when not supplied
fn param(params: &[Value], i: usize) -> &Value {
    static MISSING: Value = Value::Missing;
    params.get(i).unwrap_or(&MISSING)
}
