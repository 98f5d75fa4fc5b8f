//! Tag tokenizer and grammar
//!
//! Tags look like `{d.path[.field]*:formatter(args)*}`. Anything between
//! braces that does not match the grammar stays literal text and is reported
//! as a [`ParseWarning`].

use crate::schema::{
    ArrayMarker, FormatterCall, IndexSpec, Param, ParseWarning, ParsedTemplate, Segment, Tag,
    TemplateFormat,
};
use crate::value::{parse_number, Value};
use sha2::{Digest, Sha256};

/// Parse template content into tags
///
/// Never fails: malformed spans are kept as literal text.
pub fn parse_template(content: &str, format: TemplateFormat) -> ParsedTemplate {
    parse_with_id(content, format, template_id(content, format))
}

/// Parse with an already computed template id
pub(crate) fn parse_with_id(content: &str, format: TemplateFormat, id: String) -> ParsedTemplate {
    let mut tags = Vec::new();
    let mut warnings = Vec::new();
    let mut scanner = Scanner::new(content.as_bytes());
    let mut pos = 0;

    while let Some(found) = content[pos..].find('{') {
        let start = pos + found;
        let (resume, message) = match scanner.tag_end(start) {
            Scan::Close(end) => {
                let span = start..end + 1;
                let raw = &content[span.clone()];
                match parse_tag(&content[start + 1..end]) {
                    Ok(parsed) => {
                        tags.push(Tag {
                            id: format!("tag_{}_{}", tags.len(), start),
                            raw: raw.to_string(),
                            span,
                            path: parsed.path,
                            array: parsed.array,
                            formatters: parsed.formatters,
                        });
                        pos = end + 1;
                        continue;
                    }
                    Err(message) => (end + 1, message),
                }
            }
            Scan::Restart(next) => (next, "tag interrupted by '{'".to_string()),
            Scan::Unterminated => {
                let next = content[start + 1..]
                    .find('{')
                    .map_or(content.len(), |i| start + 1 + i);
                (next, "unterminated tag".to_string())
            }
        };

        tracing::trace!(offset = start, %message, "leaving brace span as text");
        warnings.push(ParseWarning {
            offset: start,
            raw: content[start..resume].to_string(),
            message,
        });
        pos = resume;
    }

    ParsedTemplate {
        id,
        content: content.to_string(),
        format,
        tags,
        warnings,
    }
}

/// Stable identifier for a template: SHA-256 over format and content
pub fn template_id(content: &str, format: TemplateFormat) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

enum Scan {
    /// Closing brace at this byte offset
    Close(usize),
    /// Another `{` opened first; resume scanning there
    Restart(usize),
    Unterminated,
}

/// Brace scanner over the whole content
///
/// A quote that runs to the end of the content is remembered per quote
/// character: any later quote of the same character is in the same state
/// once it opens, so it cannot close either. This keeps each byte
/// quote-scanned at most once per quote character.
struct Scanner<'a> {
    bytes: &'a [u8],
    /// Opening offsets of quotes (`"`, `'`) known to run to the end
    open_quotes: [Option<usize>; 2],
}

impl<'a> Scanner<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            open_quotes: [None; 2],
        }
    }

    fn quote_slot(quote: u8) -> usize {
        usize::from(quote == b'\'')
    }

    /// Find the `}` closing the tag opened at `start`
    ///
    /// Quotes are only significant inside a parameter list.
    fn tag_end(&mut self, start: usize) -> Scan {
        let bytes = self.bytes;
        let mut depth = 0usize;
        let mut quote: Option<(u8, usize)> = None;
        let mut i = start + 1;

        while i < bytes.len() {
            let b = bytes[i];
            if let Some((q, _)) = quote {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            } else {
                match b {
                    b'"' | b'\'' if depth > 0 => {
                        if self.open_quotes[Self::quote_slot(b)].is_some_and(|at| at < i) {
                            return Scan::Unterminated;
                        }
                        quote = Some((b, i));
                    }
                    b'(' => depth += 1,
                    b')' => depth = depth.saturating_sub(1),
                    b'{' => return Scan::Restart(i),
                    b'}' => return Scan::Close(i),
                    _ => {}
                }
            }
            i += 1;
        }

        if let Some((q, at)) = quote {
            self.open_quotes[Self::quote_slot(q)].get_or_insert(at);
        }
        Scan::Unterminated
    }
}

struct ParsedTag {
    path: Vec<Segment>,
    array: Option<ArrayMarker>,
    formatters: Vec<FormatterCall>,
}

fn parse_tag(inner: &str) -> Result<ParsedTag, String> {
    let inner = inner.trim();
    if inner.is_empty() {
        return Err("empty tag".to_string());
    }

    let mut parts = split_top_level(inner, b':')?.into_iter();
    let path_text = parts.next().unwrap_or_default();
    let (path, array) = parse_path(path_text.trim())?;

    let formatters = parts.map(parse_call).collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedTag {
        path,
        array,
        formatters,
    })
}

/// Parse `[d.]segment(.segment)*`, extracting the single array marker
fn parse_path(text: &str) -> Result<(Vec<Segment>, Option<ArrayMarker>), String> {
    // `d` alone is the root; `d[..]` indexes the root itself
    let rest = if text == "d" {
        return Ok((Vec::new(), None));
    } else if let Some(rest) = text.strip_prefix("d.") {
        rest
    } else if text.starts_with("d[") {
        &text[1..]
    } else {
        text
    };

    if rest.is_empty() {
        return Err("empty path".to_string());
    }

    let mut segments = Vec::new();
    let mut array = None;

    for (i, piece) in rest.split('.').enumerate() {
        let (name, index) = match piece.find('[') {
            Some(open) => {
                let spec = piece[open + 1..]
                    .strip_suffix(']')
                    .ok_or_else(|| format!("unclosed index in '{piece}'"))?;
                (&piece[..open], Some(parse_index(spec)?))
            }
            None => (piece, None),
        };

        let root_index = i == 0 && name.is_empty() && index.is_some();
        if !root_index && !is_identifier(name) {
            return Err(format!("invalid path segment '{piece}'"));
        }

        if let Some(index) = index {
            if array.is_some() {
                return Err("path has more than one array index".to_string());
            }
            array = Some(ArrayMarker { segment: i, index });
        }
        segments.push(Segment::new(name));
    }

    Ok((segments, array))
}

fn parse_index(spec: &str) -> Result<IndexSpec, String> {
    match spec.trim() {
        "" => Ok(IndexSpec::Aggregate),
        "i" => Ok(IndexSpec::Iterate),
        n if n.bytes().all(|b| b.is_ascii_digit()) => n
            .parse()
            .map(IndexSpec::Direct)
            .map_err(|_| format!("index '{n}' out of range")),
        other => Err(format!("unsupported index '[{other}]'")),
    }
}

/// Parse `name` or `name(param, ...)`
fn parse_call(text: &str) -> Result<FormatterCall, String> {
    let text = text.trim_end();
    let (name, args) = match text.find('(') {
        Some(open) => {
            let args = text[open + 1..]
                .strip_suffix(')')
                .ok_or_else(|| format!("formatter '{text}' is missing ')'"))?;
            (&text[..open], Some(args))
        }
        None => (text, None),
    };

    if !is_identifier(name) {
        return Err(format!("invalid formatter name '{name}'"));
    }

    let params = match args {
        Some(args) if !args.trim().is_empty() => split_top_level(args, b',')?
            .into_iter()
            .map(parse_param)
            .collect::<Result<Vec<_>, _>>()?,
        _ => Vec::new(),
    };

    Ok(FormatterCall {
        name: name.to_string(),
        params,
    })
}

fn parse_param(text: &str) -> Result<Param, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty formatter parameter".to_string());
    }

    let first = text.as_bytes()[0];
    if first == b'"' || first == b'\'' {
        return unquote(text).map(|s| Param::Literal(Value::String(s)));
    }

    match text {
        "true" => return Ok(Param::Literal(Value::Bool(true))),
        "false" => return Ok(Param::Literal(Value::Bool(false))),
        _ => {}
    }

    if let Some(n) = parse_number(text) {
        return Ok(Param::Literal(Value::Number(n)));
    }

    if let Some(path) = text.strip_prefix('.') {
        let segments = path
            .split('.')
            .map(|name| {
                if is_identifier(name) {
                    Ok(Segment::new(name))
                } else {
                    Err(format!("invalid dynamic parameter '{text}'"))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Param::Dynamic(segments));
    }

    if text.contains(['"', '\'', '(', ')']) {
        return Err(format!("invalid formatter parameter '{text}'"));
    }

    // Unquoted word: taken literally
    Ok(Param::Literal(Value::String(text.to_string())))
}

fn unquote(text: &str) -> Result<String, String> {
    let quote = text.chars().next().unwrap_or('"');
    let body = text
        .strip_prefix(quote)
        .and_then(|rest| rest.strip_suffix(quote))
        .filter(|_| text.len() >= 2)
        .ok_or_else(|| format!("unterminated string {text}"))?;

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Split on `sep` outside parentheses and quotes
fn split_top_level(text: &str, sep: u8) -> Result<Vec<&str>, String> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| "unbalanced ')'".to_string())?;
                }
                _ if b == sep && depth == 0 => {
                    parts.push(&text[last..i]);
                    last = i + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }

    if quote.is_some() {
        return Err("unterminated string".to_string());
    }
    if depth != 0 {
        return Err("unbalanced '('".to_string());
    }
    parts.push(&text[last..]);
    Ok(parts)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> ParsedTemplate {
        parse_template(content, TemplateFormat::Txt)
    }

    fn names(tag: &Tag) -> Vec<&str> {
        tag.path.iter().map(Segment::name).collect()
    }

    #[test]
    fn test_plain_text_has_no_tags() {
        let parsed = parse("Hello world");
        assert!(parsed.tags.is_empty());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_simple_tag() {
        let parsed = parse("Hello {d.name}!");
        assert_eq!(parsed.tags.len(), 1);

        let tag = &parsed.tags[0];
        assert_eq!(tag.raw, "{d.name}");
        assert_eq!(tag.span, 6..14);
        assert_eq!(names(tag), vec!["name"]);
        assert_eq!(tag.array, None);
        assert!(tag.formatters.is_empty());
    }

    #[test]
    fn test_nested_path_without_root_prefix() {
        let parsed = parse("{customer.address.city}");
        assert_eq!(names(&parsed.tags[0]), vec!["customer", "address", "city"]);
    }

    #[test]
    fn test_array_markers() {
        let parsed = parse("{d.items[i].name} {d.items[].price} {d.items[2].name}");
        let markers: Vec<_> = parsed.tags.iter().map(|t| t.array).collect();
        assert_eq!(
            markers,
            vec![
                Some(ArrayMarker {
                    segment: 0,
                    index: IndexSpec::Iterate
                }),
                Some(ArrayMarker {
                    segment: 0,
                    index: IndexSpec::Aggregate
                }),
                Some(ArrayMarker {
                    segment: 0,
                    index: IndexSpec::Direct(2)
                }),
            ]
        );
    }

    #[test]
    fn test_root_array() {
        let parsed = parse("{d[i].name}");
        let tag = &parsed.tags[0];
        assert_eq!(names(tag), vec!["", "name"]);
        assert_eq!(
            tag.array,
            Some(ArrayMarker {
                segment: 0,
                index: IndexSpec::Iterate
            })
        );
    }

    #[test]
    fn test_bare_root() {
        let parsed = parse("{d}");
        assert!(parsed.tags[0].path.is_empty());
    }

    #[test]
    fn test_second_array_marker_is_literal() {
        let parsed = parse("A {d.groups[i].items[i].name} B");
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].message.contains("more than one"));
        assert_eq!(parsed.warnings[0].offset, 2);
    }

    #[test]
    fn test_formatter_chain() {
        let parsed = parse("{d.value:add(5):mul(2)}");
        let tag = &parsed.tags[0];
        assert_eq!(
            tag.formatters,
            vec![
                FormatterCall {
                    name: "add".into(),
                    params: vec![Param::Literal(Value::Number(5.0))],
                },
                FormatterCall {
                    name: "mul".into(),
                    params: vec![Param::Literal(Value::Number(2.0))],
                },
            ]
        );
    }

    #[test]
    fn test_formatter_without_parens() {
        let parsed = parse("{d.name:upperCase:trim}");
        let calls: Vec<_> = parsed.tags[0]
            .formatters
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(calls, vec!["upperCase", "trim"]);
    }

    #[test]
    fn test_quoted_params_may_contain_separators() {
        let parsed = parse(r#"{d.flag:ifTrue("a:b)", 'c, d'):replace("\"", "x")}"#);
        let tag = &parsed.tags[0];
        assert_eq!(tag.formatters.len(), 2);
        assert_eq!(
            tag.formatters[0].params,
            vec![
                Param::Literal(Value::from("a:b)")),
                Param::Literal(Value::from("c, d")),
            ]
        );
        assert_eq!(
            tag.formatters[1].params,
            vec![
                Param::Literal(Value::from("\"")),
                Param::Literal(Value::from("x")),
            ]
        );
    }

    #[test]
    fn test_closing_brace_inside_quotes() {
        let parsed = parse(r#"{d.x:ifEmpty("}")} tail"#);
        assert_eq!(parsed.tags.len(), 1);
        assert_eq!(parsed.tags[0].raw, r#"{d.x:ifEmpty("}")}"#);
    }

    #[test]
    fn test_param_kinds() {
        let parsed = parse("{d.x:f(1.5, true, .price, .a.b, yes)}");
        assert_eq!(
            parsed.tags[0].formatters[0].params,
            vec![
                Param::Literal(Value::Number(1.5)),
                Param::Literal(Value::Bool(true)),
                Param::Dynamic(vec![Segment::new("price")]),
                Param::Dynamic(vec![Segment::new("a"), Segment::new("b")]),
                Param::Literal(Value::from("yes")),
            ]
        );
    }

    #[test]
    fn test_empty_param_list() {
        let parsed = parse("{d.n[].v:aggSum()}");
        assert!(parsed.tags[0].formatters[0].params.is_empty());
    }

    #[test]
    fn test_malformed_spans_are_literal() {
        for content in [
            "{}",
            "{ }",
            "{d.}",
            "{d.x:}",
            "{d.x:add(}",
            "{d.x:add(1,)}",
            "{d.items[x]}",
            "{color: red}",
            "{it's}",
        ] {
            let parsed = parse(content);
            assert!(parsed.tags.is_empty(), "{content} should not parse");
            assert_eq!(parsed.warnings.len(), 1, "{content} should warn");
        }
    }

    #[test]
    fn test_unterminated_brace_keeps_scanning() {
        let parsed = parse("{ never closed {d.name}");
        assert_eq!(parsed.tags.len(), 1);
        assert_eq!(parsed.tags[0].span, 15..23);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].raw, "{ never closed ");
        assert_eq!(parsed.warnings[0].offset, 0);
    }

    #[test]
    fn test_unclosed_quote_warns_and_keeps_scanning() {
        let parsed = parse(r#"{d.x:f("abc)} and {d.y}"#);
        assert_eq!(parsed.tags.len(), 1);
        assert_eq!(names(&parsed.tags[0]), vec!["y"]);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].message, "unterminated tag");
        assert_eq!(parsed.warnings[0].raw, r#"{d.x:f("abc)} and "#);
    }

    #[test]
    fn test_stray_brace_at_end_warns() {
        let parsed = parse("{d.a} {");
        assert_eq!(parsed.tags.len(), 1);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].raw, "{");
        assert_eq!(parsed.warnings[0].offset, 6);
    }

    #[test]
    fn test_unclosed_quotes_parse_in_linear_time() {
        let n = 100_000;
        let content = r#"{x(\""#.repeat(n);

        let started = std::time::Instant::now();
        let parsed = parse(&content);
        let elapsed = started.elapsed();

        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.warnings.len(), n);
        assert!(parsed.warnings.iter().all(|w| w.raw == r#"{x(\""#));
        assert!(elapsed < std::time::Duration::from_secs(5), "took {elapsed:?}");
    }

    #[test]
    fn test_later_tag_after_unclosed_quote_still_parses() {
        // the remembered quote must not affect quotes of the other character
        let parsed = parse(r#"{d.a:f("x)} {d.b:ifEmpty('ok')}"#);
        assert_eq!(parsed.tags.len(), 1);
        assert_eq!(
            parsed.tags[0].formatters[0].params,
            vec![Param::Literal(Value::from("ok"))]
        );
    }

    #[test]
    fn test_tag_ids_are_unique() {
        let parsed = parse("{d.a} {d.a} {d.a}");
        let mut ids: Vec<_> = parsed.tags.iter().map(|t| t.id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let content = "Total: {d.items[].price:aggSum():round(2)}\n- {d.items[i].name}";
        assert_eq!(parse(content), parse(content));
    }

    #[test]
    fn test_template_id_depends_on_format() {
        let a = template_id("x", TemplateFormat::Txt);
        let b = template_id("x", TemplateFormat::Html);
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(a, template_id("x", TemplateFormat::Txt));
    }
}
