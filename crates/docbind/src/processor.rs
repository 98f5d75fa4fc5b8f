//! Data binding: resolves every tag of a parsed template against a data tree

use crate::formatters;
use crate::schema::{
    FormatterCall, IndexSpec, Param, ParsedTemplate, ProcessWarning, ProcessedData, Segment, Tag,
};
use crate::value::Value;
use serde_json::Value as Json;

/// Resolve all tags of `template` against `data`
///
/// Never fails: unresolvable paths produce [`Value::Missing`] and unknown
/// formatters are recorded as warnings.
pub fn process(data: &Json, template: &ParsedTemplate) -> ProcessedData {
    let mut processed = ProcessedData::default();

    for tag in &template.tags {
        let mut eval = TagEval {
            tag,
            warnings: &mut processed.warnings,
        };

        match tag.array {
            Some(marker) if marker.index == IndexSpec::Iterate => {
                let values = eval.iterate(data, marker.segment);
                tracing::trace!(tag = %tag.id, elements = values.len(), "iterated");
                processed.per_element.insert(tag.id.clone(), values);
            }
            Some(marker) if marker.index == IndexSpec::Aggregate => {
                let value = eval.aggregate(data, marker.segment);
                tracing::trace!(tag = %tag.id, ?value, "aggregated");
                processed.aggregated.insert(tag.id.clone(), value);
            }
            _ => {
                let value = eval.scalar(data);
                tracing::trace!(tag = %tag.id, ?value, "resolved");
                processed.scalar.insert(tag.id.clone(), value);
            }
        }
    }

    processed
}

/// Walk `segments` from `value`
///
/// An empty segment name addresses the current value.
pub fn resolve_path<'a>(value: &'a Json, segments: &[Segment]) -> Option<&'a Json> {
    segments.iter().try_fold(value, |current, segment| {
        if segment.name().is_empty() {
            Some(current)
        } else {
            current.as_object()?.get(segment.name())
        }
    })
}

/// Resolve a tag's full path, honouring a `[n]` index
fn resolve_tag_path<'a>(data: &'a Json, tag: &Tag) -> Option<&'a Json> {
    match tag.array {
        Some(marker) => match marker.index {
            IndexSpec::Direct(n) => {
                let array = resolve_path(data, &tag.path[..=marker.segment])?;
                let element = array.as_array()?.get(n)?;
                resolve_path(element, &tag.path[marker.segment + 1..])
            }
            // Narrowing for `[i]`/`[]` happens per element
            IndexSpec::Iterate | IndexSpec::Aggregate => None,
        },
        None => resolve_path(data, &tag.path),
    }
}

struct TagEval<'t, 'w> {
    tag: &'t Tag,
    warnings: &'w mut Vec<ProcessWarning>,
}

impl TagEval<'_, '_> {
    fn warn(&mut self, message: String) {
        let duplicate = self
            .warnings
            .iter()
            .any(|w| w.tag_id == self.tag.id && w.message == message);
        if !duplicate {
            self.warnings.push(ProcessWarning {
                tag_id: self.tag.id.clone(),
                message,
            });
        }
    }

    fn scalar(&mut self, data: &Json) -> Value {
        let tag = self.tag;
        let base = resolve_tag_path(data, tag)
            .map(Value::from_json)
            .unwrap_or_default();
        self.apply_chain(base, &tag.formatters, data)
    }

    /// Elements of the array at `path[..=segment]`, empty when absent
    fn elements<'d>(&self, data: &'d Json, segment: usize) -> &'d [Json] {
        resolve_path(data, &self.tag.path[..=segment])
            .and_then(Json::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Base value of one element: the rest of the path resolved against it
    fn element_value(&self, element: &Json, segment: usize) -> Value {
        resolve_path(element, &self.tag.path[segment + 1..])
            .map(Value::from_json)
            .unwrap_or_default()
    }

    fn iterate(&mut self, data: &Json, segment: usize) -> Vec<Value> {
        let tag = self.tag;
        self.elements(data, segment)
            .iter()
            .map(|element| {
                let base = self.element_value(element, segment);
                self.apply_chain(base, &tag.formatters, element)
            })
            .collect()
    }

    fn aggregate(&mut self, data: &Json, segment: usize) -> Value {
        let tag = self.tag;
        let Some(split) = tag.formatters.iter().position(|call| {
            formatters::lookup(&call.name).is_some_and(|f| f.is_aggregate())
        }) else {
            self.warn("aggregate marker [] without an aggregation formatter".to_string());
            return Value::Missing;
        };

        let (per_element, rest) = tag.formatters.split_at(split);
        let (reducer, post) = rest.split_at(1);

        let values: Vec<Value> = self
            .elements(data, segment)
            .iter()
            .map(|element| {
                let base = self.element_value(element, segment);
                self.apply_chain(base, per_element, element)
            })
            .filter(|value| !value.is_missing())
            .collect();

        let reduced = formatters::lookup(&reducer[0].name)
            .and_then(|f| f.reduce(&values))
            .unwrap_or_default();

        self.apply_chain(reduced, post, data)
    }

    /// Apply `calls` left to right; dynamic parameters resolve against `context`
    fn apply_chain(&mut self, mut value: Value, calls: &[FormatterCall], context: &Json) -> Value {
        for call in calls {
            let Some(formatter) = formatters::lookup(&call.name) else {
                self.warn(format!("unknown formatter '{}'", call.name));
                continue;
            };
            if formatter.is_aggregate() {
                self.warn(format!(
                    "aggregation formatter '{}' is only valid once in a [] tag",
                    call.name
                ));
                continue;
            }

            let params: Vec<Value> = call
                .params
                .iter()
                .map(|param| resolve_param(param, context))
                .collect();
            value = formatter.apply(&value, &params);
        }
        value
    }
}

fn resolve_param(param: &Param, context: &Json) -> Value {
    match param {
        Param::Literal(value) => value.clone(),
        Param::Dynamic(path) => resolve_path(context, path)
            .map(Value::from_json)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_template;
    use crate::schema::TemplateFormat;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(content: &str, data: Json) -> (ParsedTemplate, ProcessedData) {
        let parsed = parse_template(content, TemplateFormat::Txt);
        let processed = process(&data, &parsed);
        (parsed, processed)
    }

    fn first_scalar(content: &str, data: Json) -> Value {
        let (parsed, processed) = run(content, data);
        processed.scalar[&parsed.tags[0].id].clone()
    }

    #[test]
    fn test_resolve_path() {
        let data = json!({ "customer": { "name": "Jane" } });
        let path = vec![Segment::new("customer"), Segment::new("name")];
        assert_eq!(resolve_path(&data, &path), Some(&json!("Jane")));
        assert_eq!(resolve_path(&data, &[Segment::new("nope")]), None);
        assert_eq!(resolve_path(&data, &[]), Some(&data));
    }

    #[test]
    fn test_resolve_through_non_object() {
        let data = json!({ "name": "John" });
        let path = vec![Segment::new("name"), Segment::new("first")];
        assert_eq!(resolve_path(&data, &path), None);
    }

    #[test]
    fn test_scalar_tag() {
        assert_eq!(
            first_scalar("{d.name}", json!({ "name": "World" })),
            Value::from("World")
        );
    }

    #[test]
    fn test_missing_field() {
        assert_eq!(first_scalar("{d.a.b.c}", json!({ "a": 1 })), Value::Missing);
    }

    #[test]
    fn test_direct_index() {
        let data = json!({ "items": [{ "name": "A" }, { "name": "B" }] });
        assert_eq!(first_scalar("{d.items[1].name}", data.clone()), Value::from("B"));
        assert_eq!(first_scalar("{d.items[5].name}", data), Value::Missing);
        assert_eq!(
            first_scalar("{d.name[0]}", json!({ "name": "x" })),
            Value::Missing
        );
    }

    #[test]
    fn test_chain_is_left_associative() {
        assert_eq!(
            first_scalar("{d.value:add(5):mul(2)}", json!({ "value": 10 })),
            Value::Number(30.0)
        );
    }

    #[test]
    fn test_dynamic_param_against_root() {
        assert_eq!(
            first_scalar(
                "{d.quantity:mul(.price)}",
                json!({ "quantity": 2, "price": 999.99 })
            ),
            Value::Number(1999.98)
        );
    }

    #[test]
    fn test_missing_with_if_true() {
        assert_eq!(
            first_scalar(r#"{d.missing:ifTrue("Found","Not Found")}"#, json!({})),
            Value::from("Not Found")
        );
    }

    #[test]
    fn test_unknown_formatter_passes_through() {
        let (parsed, processed) = run("{d.name:shout:upperCase}", json!({ "name": "hi" }));
        assert_eq!(processed.scalar[&parsed.tags[0].id], Value::from("HI"));
        assert_eq!(processed.warnings.len(), 1);
        assert!(processed.warnings[0].message.contains("shout"));
    }

    #[test]
    fn test_iterate() {
        let data = json!({
            "items": [
                { "name": "Apple", "qty": 2, "price": 1.5 },
                { "name": "Pear", "qty": 1, "price": 3 },
                { "qty": 4, "price": 0.25 }
            ]
        });
        let (parsed, processed) = run("{d.items[i].name} {d.items[i].qty:mul(.price)}", data);

        assert_eq!(
            processed.per_element[&parsed.tags[0].id],
            vec![Value::from("Apple"), Value::from("Pear"), Value::Missing]
        );
        assert_eq!(
            processed.per_element[&parsed.tags[1].id],
            vec![Value::Number(3.0), Value::Number(3.0), Value::Number(1.0)]
        );
    }

    #[test]
    fn test_iterate_missing_or_non_array() {
        let (parsed, processed) = run("{d.items[i].name} {d.other[i]}", json!({ "other": 5 }));
        assert!(processed.per_element[&parsed.tags[0].id].is_empty());
        assert!(processed.per_element[&parsed.tags[1].id].is_empty());
    }

    #[test]
    fn test_iterate_root_array() {
        let (parsed, processed) = run("{d[i].n}", json!([{ "n": 1 }, { "n": 2 }]));
        assert_eq!(
            processed.per_element[&parsed.tags[0].id],
            vec![Value::Number(1.0), Value::Number(2.0)]
        );
    }

    #[test]
    fn test_aggregate() {
        let data = json!({ "numbers": [{ "value": 10 }, { "value": 20 }, { "value": 30 }] });
        for (formatter, expected) in [("aggSum", 60.0), ("aggCount", 3.0), ("aggAvg", 20.0)] {
            let content = format!("{{d.numbers[].value:{formatter}()}}");
            let (parsed, processed) = run(&content, data.clone());
            assert_eq!(
                processed.aggregated[&parsed.tags[0].id],
                Value::Number(expected),
                "{formatter}"
            );
        }
    }

    #[test]
    fn test_aggregate_with_pre_and_post_chains() {
        let data = json!({
            "lines": [
                { "qty": 2, "price": 10 },
                { "qty": 1, "price": 5.5 },
                { "price": 100 }
            ]
        });
        let (parsed, processed) = run(
            "{d.lines[].qty:mul(.price):aggSum():mul(1.1):round(2)}",
            data,
        );
        assert_eq!(
            processed.aggregated[&parsed.tags[0].id],
            Value::Number(28.05)
        );
    }

    #[test]
    fn test_aggregate_skips_missing_for_count() {
        let data = json!({ "rows": [{ "v": 0 }, {}, { "v": 5 }] });
        let (parsed, processed) = run("{d.rows[].v:aggCount()}", data);
        assert_eq!(processed.aggregated[&parsed.tags[0].id], Value::Number(2.0));
    }

    #[test]
    fn test_aggregate_without_aggregator() {
        let (parsed, processed) = run("{d.rows[].v}", json!({ "rows": [{ "v": 1 }] }));
        assert_eq!(processed.aggregated[&parsed.tags[0].id], Value::Missing);
        assert_eq!(processed.warnings.len(), 1);
    }

    #[test]
    fn test_aggregator_outside_aggregate_tag_passes_through() {
        let (parsed, processed) = run("{d.total:aggSum()}", json!({ "total": 7 }));
        assert_eq!(processed.scalar[&parsed.tags[0].id], Value::Number(7.0));
        assert_eq!(processed.warnings.len(), 1);
    }

    #[test]
    fn test_every_tag_has_an_entry() {
        let (parsed, processed) = run(
            "{d.a} {d.b[i].c} {d.d[].e:aggSum()} {d.f[0]}",
            json!({}),
        );
        for tag in &parsed.tags {
            let present = processed.scalar.contains_key(&tag.id)
                || processed.per_element.contains_key(&tag.id)
                || processed.aggregated.contains_key(&tag.id);
            assert!(present, "{} has no entry", tag.id);
        }
    }

    #[test]
    fn test_warnings_are_not_repeated_per_element() {
        let data = json!({ "items": [1, 2, 3] });
        let (_, processed) = run("{d.items[i]:nope}", data);
        assert_eq!(processed.warnings.len(), 1);
    }
}
