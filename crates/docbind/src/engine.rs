//! Engine facade: options, parse cache and the full render pipeline

use crate::cache::TemplateCache;
use crate::parser::parse_template;
use crate::processor;
use crate::renderer::Renderer;
use crate::schema::{
    ParsedTemplate, ProcessedData, RenderRequest, RenderResult, Template, TemplateFormat,
};
use crate::timing::Stopwatch;
use crate::{Result, TemplateError};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    256
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EngineOptions {
    /// Reuse parse results for identical templates
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Maximum number of cached templates
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Emit parse and process warnings through `tracing`
    #[serde(default = "default_true")]
    pub log_warnings: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_capacity: default_cache_capacity(),
            log_warnings: true,
        }
    }
}

impl EngineOptions {
    /// Parse options from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(TemplateError::from)
    }
}

/// Template engine
///
/// Cheap to share across threads: renders never touch each other's state,
/// and the parse cache is the only shared structure.
pub struct Engine {
    options: EngineOptions,
    cache: Option<TemplateCache>,
}

static GLOBAL: Lazy<Engine> = Lazy::new(|| Engine::new(EngineOptions::default()));

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        let cache = options
            .cache_enabled
            .then(|| TemplateCache::new(options.cache_capacity));
        Self { options, cache }
    }

    /// Process-wide engine with default options
    pub fn global() -> &'static Engine {
        &GLOBAL
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Number of templates currently cached
    pub fn cached_templates(&self) -> usize {
        self.cache.as_ref().map_or(0, TemplateCache::len)
    }

    /// Parse a template, using the cache when enabled
    pub fn parse(&self, content: &str, format: TemplateFormat) -> Arc<ParsedTemplate> {
        let (parsed, fresh) = match &self.cache {
            Some(cache) => {
                let lookup = cache.get_or_parse(content, format);
                (lookup.template, !lookup.hit)
            }
            None => (Arc::new(parse_template(content, format)), true),
        };

        if fresh && self.options.log_warnings {
            for warning in &parsed.warnings {
                tracing::warn!(template_id = %parsed.id, "unparsed tag {warning}");
            }
        }
        parsed
    }

    /// Resolve a parsed template's tags against `data`
    pub fn process(&self, data: &serde_json::Value, template: &ParsedTemplate) -> ProcessedData {
        let processed = processor::process(data, template);
        if self.options.log_warnings {
            for warning in &processed.warnings {
                tracing::warn!(template_id = %template.id, "{warning}");
            }
        }
        processed
    }

    /// Parse, process and render in one call
    pub fn render(&self, template: &Template, data: &serde_json::Value) -> RenderResult {
        let parsed = self.parse(&template.content, template.format);

        let stopwatch = Stopwatch::start();
        let processed = self.process(data, &parsed);
        let result = Renderer::new(&parsed, &processed).render_with(stopwatch);

        tracing::debug!(
            template_id = %result.metadata.template_id,
            tags = parsed.tags.len(),
            output_size = result.metadata.output_size,
            duration_us = result.metadata.duration.as_micros() as u64,
            "rendered template"
        );
        result
    }

    pub fn render_request(&self, request: &RenderRequest) -> RenderResult {
        self.render(&request.template, &request.data)
    }

    /// Render a JSON request document (`{"template": ..., "data": ...}`)
    pub fn render_json(&self, request_json: &str) -> Result<RenderResult> {
        let request = RenderRequest::from_json(request_json)?;
        Ok(self.render_request(&request))
    }
}
