//! WASM bindings for docbind
//!
//! This crate provides JavaScript-friendly API for:
//! - Parsing templates and inspecting their tags
//! - Resolving tags against data
//! - Rendering templates with data
//!
//! # Example (JavaScript)
//!
//! ```javascript
//! import init, { TemplateEngine, parseTemplate } from 'docbind-wasm';
//!
//! await init();
//!
//! const engine = new TemplateEngine();
//! const output = engine.render("Total: {d.items[].price:aggSum()}", "txt", {
//!   items: [{ price: 10 }, { price: 20 }],
//! });
//! console.log(output.content); // "Total: 30"
//!
//! // Inspect tags without rendering
//! const parsed = parseTemplate("{d.name:upperCase}", "txt");
//! ```

use docbind::{Engine, EngineOptions, ParsedTemplate, RenderResult, Template, TemplateFormat};
use serde::Serialize;
use wasm_bindgen::prelude::*;

// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    // Plain objects rather than Map for keyed collections
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value.serialize(&serializer).map_err(JsValue::from)
}

fn parse_format(format: Option<String>) -> Result<TemplateFormat, JsValue> {
    match format {
        Some(name) => name.parse().map_err(js_error),
        None => Ok(TemplateFormat::default()),
    }
}

/// Parse a template and return its tags
///
/// @param content - Template text
/// @param format - Format name (defaults to "txt")
/// @returns Parsed template object
#[wasm_bindgen(js_name = parseTemplate)]
pub fn parse_template(content: &str, format: Option<String>) -> Result<JsValue, JsValue> {
    let parsed = docbind::parse_template(content, parse_format(format)?);
    to_js(&parsed)
}

/// Resolve a parsed template's tags against data
///
/// @param data - Data object
/// @param parsed - Object returned by parseTemplate
/// @returns Processed values keyed by tag id
#[wasm_bindgen(js_name = process)]
pub fn process_data(data: JsValue, parsed: JsValue) -> Result<JsValue, JsValue> {
    let data: serde_json::Value = serde_wasm_bindgen::from_value(data)?;
    let parsed: ParsedTemplate = serde_wasm_bindgen::from_value(parsed)?;
    to_js(&docbind::process(&data, &parsed))
}

/// Render with the shared default engine
///
/// @param content - Template text
/// @param format - Format name (defaults to "txt")
/// @param data - Data object
/// @returns Rendered text
#[wasm_bindgen]
pub fn render(content: &str, format: Option<String>, data: JsValue) -> Result<String, JsValue> {
    let template = Template::new(content, parse_format(format)?);
    let data: serde_json::Value = serde_wasm_bindgen::from_value(data)?;
    Ok(Engine::global().render(&template, &data).text().into_owned())
}

/// List formatter names
#[wasm_bindgen]
pub fn formatters() -> Vec<JsValue> {
    docbind::formatters::names()
        .into_iter()
        .map(JsValue::from_str)
        .collect()
}

/// Result of `TemplateEngine.render`
#[wasm_bindgen]
pub struct RenderOutput {
    inner: RenderResult,
}

#[wasm_bindgen]
impl RenderOutput {
    /// Rendered text
    #[wasm_bindgen(getter)]
    pub fn content(&self) -> String {
        self.inner.text().into_owned()
    }

    /// Rendered bytes (Uint8Array)
    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.content.clone()
    }

    #[wasm_bindgen(getter, js_name = templateId)]
    pub fn template_id(&self) -> String {
        self.inner.metadata.template_id.clone()
    }

    #[wasm_bindgen(getter, js_name = outputSize)]
    pub fn output_size(&self) -> usize {
        self.inner.metadata.output_size
    }

    /// Processing plus rendering time in milliseconds
    #[wasm_bindgen(getter, js_name = durationMs)]
    pub fn duration_ms(&self) -> f64 {
        self.inner.metadata.duration.as_secs_f64() * 1000.0
    }

    #[wasm_bindgen(getter)]
    pub fn warnings(&self) -> Vec<JsValue> {
        self.inner
            .warnings
            .iter()
            .map(|w| JsValue::from_str(w))
            .collect()
    }
}

/// Template engine with its own options and parse cache
#[wasm_bindgen]
pub struct TemplateEngine {
    inner: Engine,
}

#[wasm_bindgen]
impl TemplateEngine {
    /// Create an engine with default options
    #[wasm_bindgen(constructor)]
    pub fn new() -> TemplateEngine {
        TemplateEngine {
            inner: Engine::default(),
        }
    }

    /// Create an engine from options JSON
    ///
    /// @param json - e.g. `{"cacheEnabled": false}`
    /// @returns TemplateEngine instance
    #[wasm_bindgen(js_name = withOptions)]
    pub fn with_options(json: &str) -> Result<TemplateEngine, JsValue> {
        let options = EngineOptions::from_json(json).map_err(js_error)?;
        Ok(TemplateEngine {
            inner: Engine::new(options),
        })
    }

    /// Render a template with data
    ///
    /// @param content - Template text
    /// @param format - Format name (defaults to "txt")
    /// @param data - Data object
    /// @returns RenderOutput
    pub fn render(
        &self,
        content: &str,
        format: Option<String>,
        data: JsValue,
    ) -> Result<RenderOutput, JsValue> {
        let template = Template::new(content, parse_format(format)?);
        let data: serde_json::Value = serde_wasm_bindgen::from_value(data)?;
        Ok(RenderOutput {
            inner: self.inner.render(&template, &data),
        })
    }

    /// Render a request JSON string (`{"template": {...}, "data": {...}}`)
    #[wasm_bindgen(js_name = renderJson)]
    pub fn render_json(&self, request: &str) -> Result<RenderOutput, JsValue> {
        let inner = self.inner.render_json(request).map_err(js_error)?;
        Ok(RenderOutput { inner })
    }

    /// Number of templates held in the parse cache
    #[wasm_bindgen(getter, js_name = cachedTemplates)]
    pub fn cached_templates(&self) -> usize {
        self.inner.cached_templates()
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
