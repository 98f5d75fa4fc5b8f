//! Template rendering
//!
//! Substitutes resolved values into the template text. Tags iterating an
//! array (`[i]`) make the whole lines they sit on repeat once per element;
//! everything outside those lines renders exactly once.

use crate::schema::{ParsedTemplate, ProcessedData, RenderMetadata, RenderResult, Tag};
use crate::timing::Stopwatch;
use std::ops::Range;

/// Render processed values into a template
pub fn render(template: &ParsedTemplate, data: &ProcessedData) -> RenderResult {
    Renderer::new(template, data).render()
}

/// Template renderer
pub struct Renderer<'a> {
    /// The parsed template
    template: &'a ParsedTemplate,
    /// Values for its tags
    data: &'a ProcessedData,
}

impl<'a> Renderer<'a> {
    pub fn new(template: &'a ParsedTemplate, data: &'a ProcessedData) -> Self {
        Self { template, data }
    }

    /// Render, timing only the substitution
    pub fn render(&self) -> RenderResult {
        self.render_with(Stopwatch::start())
    }

    /// Render, reporting the time elapsed since `stopwatch` started
    pub(crate) fn render_with(&self, stopwatch: Stopwatch) -> RenderResult {
        let output = self.substitute();
        let duration = stopwatch.elapsed();

        let warnings = self
            .template
            .warnings
            .iter()
            .map(ToString::to_string)
            .chain(self.data.warnings.iter().map(ToString::to_string))
            .collect();

        RenderResult {
            metadata: RenderMetadata {
                duration,
                template_id: self.template.id.clone(),
                output_size: output.len(),
            },
            content: output.into_bytes(),
            warnings,
        }
    }

    fn substitute(&self) -> String {
        let content = &self.template.content;
        let mut out = String::with_capacity(content.len());
        let mut cursor = 0;

        for region in repeat_regions(self.template) {
            self.write_span(&mut out, cursor..region.start, |tag| self.single(tag));
            self.write_region(&mut out, region.clone());
            cursor = region.end;
        }
        self.write_span(&mut out, cursor..content.len(), |tag| self.single(tag));

        out
    }

    fn single(&self, tag: &Tag) -> String {
        self.data.single(&tag.id).render()
    }

    /// Copy `range` of the content, replacing every tag inside it
    fn write_span(&self, out: &mut String, range: Range<usize>, value_of: impl Fn(&Tag) -> String) {
        let content = &self.template.content;
        let mut cursor = range.start;

        for tag in tags_within(self.template, &range) {
            out.push_str(&content[cursor..tag.span.start]);
            out.push_str(&value_of(tag));
            cursor = tag.span.end;
        }
        out.push_str(&content[cursor..range.end]);
    }

    /// Emit one replica of `region` per array element
    fn write_region(&self, out: &mut String, region: Range<usize>) {
        let content = &self.template.content;

        // Arrays sharing a region may differ in length: use the longest,
        // shorter ones read as missing past their end
        let count = tags_within(self.template, &region)
            .filter(|tag| tag.is_iterate())
            .map(|tag| self.data.element_count(&tag.id))
            .max()
            .unwrap_or(0);

        let separator = if content[region.clone()].ends_with('\n') {
            ""
        } else {
            line_break(content)
        };

        for index in 0..count {
            if index > 0 {
                out.push_str(separator);
            }
            self.write_span(out, region.clone(), |tag| {
                if tag.is_iterate() {
                    self.data.element(&tag.id, index).render()
                } else {
                    self.single(tag)
                }
            });
        }

        tracing::trace!(start = region.start, end = region.end, count, "replicated region");
    }
}

fn tags_within<'t>(
    template: &'t ParsedTemplate,
    range: &Range<usize>,
) -> impl Iterator<Item = &'t Tag> {
    let range = range.clone();
    template
        .tags
        .iter()
        .filter(move |tag| tag.span.start >= range.start && tag.span.end <= range.end)
}

/// Line-break style of the template
fn line_break(content: &str) -> &'static str {
    if content.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Whole lines covering `span`, including the final line break
fn line_block(content: &str, span: Range<usize>) -> Range<usize> {
    let start = content[..span.start].rfind('\n').map_or(0, |i| i + 1);
    let end = content[span.end..]
        .find('\n')
        .map_or(content.len(), |i| span.end + i + 1);
    start..end
}

/// Regions of the content to replicate, sorted and non-overlapping
///
/// Iterate tags are grouped by the array they walk. Within a group,
/// consecutive members stay in one region unless they sit on different
/// lines with some other tag between them. Overlapping regions of
/// different arrays are merged.
fn repeat_regions(template: &ParsedTemplate) -> Vec<Range<usize>> {
    let content = template.content.as_str();
    let tags = &template.tags;

    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, tag) in tags.iter().enumerate() {
        let Some(key) = tag.array_key().filter(|_| tag.is_iterate()) else {
            continue;
        };
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(i),
            None => groups.push((key, vec![i])),
        }
    }

    let mut regions = Vec::new();
    for (_, members) in &groups {
        let mut first = members[0];
        let mut prev = members[0];
        for &member in &members[1..] {
            let other_line = content[tags[prev].span.end..tags[member].span.start].contains('\n');
            let interrupted = member > prev + 1;
            if other_line && interrupted {
                regions.push(line_block(
                    content,
                    tags[first].span.start..tags[prev].span.end,
                ));
                first = member;
            }
            prev = member;
        }
        regions.push(line_block(
            content,
            tags[first].span.start..tags[prev].span.end,
        ));
    }

    let mut regions: Vec<_> = regions
        .into_iter()
        .map(|region| cover_straddling_tags(content, tags, region))
        .collect();
    regions.sort_by_key(|region| region.start);

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(regions.len());
    for region in regions {
        match merged.last_mut() {
            Some(last) if region.start < last.end => last.end = last.end.max(region.end),
            _ => merged.push(region),
        }
    }
    merged
}

/// Grow `region` until no tag crosses its boundary (tags may span lines)
fn cover_straddling_tags(content: &str, tags: &[Tag], mut region: Range<usize>) -> Range<usize> {
    loop {
        let crossing = tags.iter().find(|tag| {
            let crosses_start = tag.span.start < region.start && tag.span.end > region.start;
            let crosses_end = tag.span.start < region.end && tag.span.end > region.end;
            crosses_start || crosses_end
        });
        match crossing {
            Some(tag) => {
                let covered = region.start.min(tag.span.start)..region.end.max(tag.span.end);
                region = line_block(content, covered);
            }
            None => return region,
        }
    }
}
