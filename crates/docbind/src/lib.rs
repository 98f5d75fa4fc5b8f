//! docbind - document template engine
//!
//! This crate provides:
//! - A tag parser for `{d.path:formatter(args)}` expressions
//! - A fixed registry of chainable formatters
//! - Data processing with per-element iteration (`[i]`) and aggregation (`[]`)
//! - Rendering that repeats template lines once per array element
//!
//! # Example
//!
//! ```
//! use docbind::{Engine, Template, TemplateFormat};
//! use serde_json::json;
//!
//! let template = Template::new("Hello {d.name:upperCase}!", TemplateFormat::Txt);
//! let result = Engine::global().render(&template, &json!({ "name": "World" }));
//! assert_eq!(result.text(), "Hello WORLD!");
//! ```

mod cache;
mod engine;
pub mod formatters;
pub mod parser;
pub mod processor;
pub mod renderer;
mod schema;
mod timing;
pub mod value;

pub use cache::{Lookup, TemplateCache};
pub use engine::{Engine, EngineOptions};
pub use parser::parse_template;
pub use processor::process;
pub use schema::*;
pub use value::Value;

use thiserror::Error;

/// Errors at the edges of the engine
///
/// Parsing, processing and rendering themselves never fail; these cover
/// malformed request documents and configuration.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to parse template: {0}")]
    ParseError(String),

    #[error("Unsupported template format: {0}")]
    UnsupportedFormat(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for template operations
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Render a request with the process-wide engine
pub fn render(request: &RenderRequest) -> RenderResult {
    Engine::global().render_request(request)
}
