//! Parse cache keyed by template hash
//!
//! The only shared mutable state in the engine. Hits are plain reads;
//! concurrent misses for the same content converge on whichever parse is
//! inserted first.

use crate::parser::{parse_with_id, template_id};
use crate::schema::{ParsedTemplate, TemplateFormat};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct TemplateCache {
    entries: DashMap<String, Arc<ParsedTemplate>>,
    capacity: usize,
    /// Slots taken, including inserts still in flight; never exceeds `capacity`
    reserved: AtomicUsize,
}

/// Outcome of a cache lookup
pub struct Lookup {
    pub template: Arc<ParsedTemplate>,
    /// Served from the cache without parsing
    pub hit: bool,
}

impl TemplateCache {
    /// Create a cache holding at most `capacity` templates
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            reserved: AtomicUsize::new(0),
        }
    }

    /// Return the parsed template for `content`, parsing on a miss
    ///
    /// When the cache is full the fresh parse is returned without being stored.
    pub fn get_or_parse(&self, content: &str, format: TemplateFormat) -> Lookup {
        let id = template_id(content, format);

        if let Some(cached) = self.entries.get(&id) {
            tracing::debug!(template_id = %id, "template cache hit");
            return Lookup {
                template: Arc::clone(&cached),
                hit: true,
            };
        }

        tracing::debug!(template_id = %id, "template cache miss");
        let parsed = Arc::new(parse_with_id(content, format, id.clone()));

        if !self.reserve_slot() {
            tracing::debug!(capacity = self.capacity, "template cache full, not storing");
            return Lookup {
                template: parsed,
                hit: false,
            };
        }

        let template = match self.entries.entry(id) {
            Entry::Occupied(entry) => {
                // another thread stored the same template first
                self.reserved.fetch_sub(1, Ordering::AcqRel);
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => Arc::clone(entry.insert(parsed).value()),
        };
        Lookup {
            template,
            hit: false,
        }
    }

    fn reserve_slot(&self) -> bool {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                (taken < self.capacity).then_some(taken + 1)
            })
            .is_ok()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.reserved.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_lookup_hits() {
        let cache = TemplateCache::new(8);
        let first = cache.get_or_parse("Hello {d.name}", TemplateFormat::Txt);
        let second = cache.get_or_parse("Hello {d.name}", TemplateFormat::Txt);

        assert!(!first.hit);
        assert!(second.hit);
        assert!(Arc::ptr_eq(&first.template, &second.template));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_format_is_part_of_key() {
        let cache = TemplateCache::new(8);
        cache.get_or_parse("{d.x}", TemplateFormat::Txt);
        let other = cache.get_or_parse("{d.x}", TemplateFormat::Html);
        assert!(!other.hit);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_full_cache_still_parses() {
        let cache = TemplateCache::new(1);
        cache.get_or_parse("a", TemplateFormat::Txt);
        let lookup = cache.get_or_parse("{d.b}", TemplateFormat::Txt);

        assert!(!lookup.hit);
        assert_eq!(lookup.template.tags.len(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache = TemplateCache::new(4);
        cache.get_or_parse("a", TemplateFormat::Txt);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_frees_capacity() {
        let cache = TemplateCache::new(1);
        cache.get_or_parse("a", TemplateFormat::Txt);
        cache.clear();
        cache.get_or_parse("b", TemplateFormat::Txt);
        assert!(cache.get_or_parse("b", TemplateFormat::Txt).hit);
    }

    #[test]
    fn test_concurrent_misses_respect_capacity() {
        let cache = Arc::new(TemplateCache::new(4));
        let handles: Vec<_> = (0..32)
            .map(|n| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let content = format!("{{d.field_{n}}}");
                    cache.get_or_parse(&content, TemplateFormat::Txt).template
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().tags.len(), 1);
        }
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_concurrent_lookups_share_one_entry() {
        let cache = Arc::new(TemplateCache::new(4));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache
                        .get_or_parse("{d.items[i].name}", TemplateFormat::Txt)
                        .template
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(cache.len(), 1);
        assert!(results.iter().all(|t| t.tags == results[0].tags));
    }
}
