//! Template, tag and render result types

use crate::value::Value;
use crate::{Result, TemplateError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::time::Duration;

/// Document format a template was authored in
///
/// Informational only: the tag grammar is the same for every format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    #[default]
    Txt,
    Html,
    Xml,
    Md,
    Json,
    Csv,
    Docx,
    Xlsx,
    Pptx,
    Odt,
    Ods,
    Pdf,
}

impl TemplateFormat {
    pub const ALL: [TemplateFormat; 12] = [
        TemplateFormat::Txt,
        TemplateFormat::Html,
        TemplateFormat::Xml,
        TemplateFormat::Md,
        TemplateFormat::Json,
        TemplateFormat::Csv,
        TemplateFormat::Docx,
        TemplateFormat::Xlsx,
        TemplateFormat::Pptx,
        TemplateFormat::Odt,
        TemplateFormat::Ods,
        TemplateFormat::Pdf,
    ];

    /// Lowercase name, also the file extension
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateFormat::Txt => "txt",
            TemplateFormat::Html => "html",
            TemplateFormat::Xml => "xml",
            TemplateFormat::Md => "md",
            TemplateFormat::Json => "json",
            TemplateFormat::Csv => "csv",
            TemplateFormat::Docx => "docx",
            TemplateFormat::Xlsx => "xlsx",
            TemplateFormat::Pptx => "pptx",
            TemplateFormat::Odt => "odt",
            TemplateFormat::Ods => "ods",
            TemplateFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateFormat {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().trim_start_matches('.').to_ascii_lowercase();
        let wanted = match wanted.as_str() {
            "text" => "txt",
            "htm" => "html",
            "markdown" => "md",
            other => other,
        };
        TemplateFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| TemplateError::UnsupportedFormat(s.to_string()))
    }
}

/// A template as submitted to a render call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Template {
    /// Template text containing `{...}` tags
    pub content: String,

    /// Authoring format
    #[serde(default)]
    pub format: TemplateFormat,
}

impl Template {
    pub fn new(content: impl Into<String>, format: TemplateFormat) -> Self {
        Self {
            content: content.into(),
            format,
        }
    }

    /// Parse a template document from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TemplateError::ParseError(e.to_string()))
    }
}

/// A render call's input: template plus data tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub template: Template,

    /// Arbitrary data, addressed as `d` inside tags
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RenderRequest {
    pub fn new(template: Template, data: serde_json::Value) -> Self {
        Self { template, data }
    }

    /// Parse a request document: `{"template": {...}, "data": {...}}`
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TemplateError::ParseError(e.to_string()))
    }
}

/// Result of parsing a template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedTemplate {
    /// Stable identifier (content hash)
    pub id: String,

    /// Original content
    pub content: String,

    pub format: TemplateFormat,

    /// Tags in document order
    pub tags: Vec<Tag>,

    /// Brace spans that looked like tags but did not parse
    #[serde(default)]
    pub warnings: Vec<ParseWarning>,
}

impl ParsedTemplate {
    pub fn tag(&self, id: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.id == id)
    }
}

/// One `{...}` data-binding expression
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    /// Unique within the template: `tag_<ordinal>_<offset>`
    pub id: String,

    /// Original text including braces
    pub raw: String,

    /// Byte range of `raw` inside the template content
    pub span: Range<usize>,

    /// Path segments with the leading `d.` removed
    pub path: Vec<Segment>,

    /// Array marker, if one segment carries an index
    #[serde(default)]
    pub array: Option<ArrayMarker>,

    /// Formatter chain, applied left to right
    #[serde(default)]
    pub formatters: Vec<FormatterCall>,
}

impl Tag {
    pub fn is_iterate(&self) -> bool {
        matches!(
            self.array,
            Some(ArrayMarker {
                index: IndexSpec::Iterate,
                ..
            })
        )
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self.array,
            Some(ArrayMarker {
                index: IndexSpec::Aggregate,
                ..
            })
        )
    }

    /// Dotted path up to and including the marked segment, e.g. `order.items`
    ///
    /// Two tags iterating the same array share this key.
    pub fn array_key(&self) -> Option<String> {
        let marker = self.array.as_ref()?;
        let key = self.path[..=marker.segment]
            .iter()
            .map(|s| s.0.as_str())
            .collect::<Vec<_>>()
            .join(".");
        Some(key)
    }
}

/// A path segment: one field name
///
/// The empty name addresses the current value itself (`{d[i]}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Segment(pub String);

impl Segment {
    pub fn new(name: impl Into<String>) -> Self {
        Segment(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Where and how a tag's path branches into an array
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArrayMarker {
    /// Index into `Tag::path` of the segment carrying the marker
    pub segment: usize,
    pub index: IndexSpec,
}

/// Content of a `[...]` index specifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexSpec {
    /// `[n]`: select one element
    Direct(usize),
    /// `[i]`: replicate per element
    Iterate,
    /// `[]`: reduce all elements
    Aggregate,
}

/// One `name(args)` link of a formatter chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormatterCall {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
}

/// Formatter argument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Param {
    Literal(Value),
    /// `.field` path, resolved against the element context
    Dynamic(Vec<Segment>),
}

/// A `{...}` span that was left as literal text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseWarning {
    pub offset: usize,
    pub raw: String,
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}: {}", self.raw, self.offset, self.message)
    }
}

/// Non-fatal problem found while evaluating a tag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessWarning {
    pub tag_id: String,
    pub message: String,
}

impl fmt::Display for ProcessWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tag_id, self.message)
    }
}

/// Resolved values for every tag of one template
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessedData {
    /// Plain and `[n]` tags
    pub scalar: BTreeMap<String, Value>,

    /// `[i]` tags: one value per array element
    #[serde(rename = "perElement")]
    pub per_element: BTreeMap<String, Vec<Value>>,

    /// `[]` tags: one reduced value
    pub aggregated: BTreeMap<String, Value>,

    #[serde(default)]
    pub warnings: Vec<ProcessWarning>,
}

impl ProcessedData {
    /// Value of a non-iterating tag
    pub fn single(&self, tag_id: &str) -> &Value {
        static MISSING: Value = Value::Missing;
        self.scalar
            .get(tag_id)
            .or_else(|| self.aggregated.get(tag_id))
            .unwrap_or(&MISSING)
    }

    /// Value of an iterating tag for one element index
    pub fn element(&self, tag_id: &str, index: usize) -> &Value {
        static MISSING: Value = Value::Missing;
        self.per_element
            .get(tag_id)
            .and_then(|values| values.get(index))
            .unwrap_or(&MISSING)
    }

    pub fn element_count(&self, tag_id: &str) -> usize {
        self.per_element.get(tag_id).map_or(0, Vec::len)
    }
}

/// Output of a render call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderResult {
    pub content: Vec<u8>,
    pub metadata: RenderMetadata,

    /// Parse and process warnings, as display strings
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl RenderResult {
    /// Content as text
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Timing and size information for a render
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderMetadata {
    pub duration: Duration,

    #[serde(rename = "templateId")]
    pub template_id: String,

    #[serde(rename = "outputSize")]
    pub output_size: usize,
}
