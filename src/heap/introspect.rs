/*!
 * Introspection
 * Descriptor lookups and span census
 */

use super::span::{Span, SpanLocation};
use super::stats::{LargeSpanStats, SmallSpanStats};
use super::HeapCore;
use crate::core::limits::MAX_PAGES;
use crate::core::types::PageId;
use crate::sys::SystemSource;

impl<S: SystemSource> HeapCore<S> {
    pub(crate) fn descriptor(&self, p: PageId) -> Option<Span> {
        let id = self.owner_of(p)?;
        let r = self.record(id);
        Some(Span {
            start: r.start,
            length: r.length,
            id,
        })
    }

    pub(crate) fn location_of(&self, span: Span) -> Option<SpanLocation> {
        let r = self.arena.get(span.id)?;
        if r.start == span.start {
            Some(r.location)
        } else {
            None
        }
    }

    /// First span whose start page is at or after `from`
    pub(crate) fn next_range(&self, from: PageId) -> Option<Span> {
        let mut p = from;
        loop {
            let (slot, id) = self.directory.next_set(p)?;
            if let Some(r) = self.arena.get(id) {
                if r.start <= slot && slot < r.start + r.length {
                    if r.start >= from {
                        return Some(Span {
                            start: r.start,
                            length: r.length,
                            id,
                        });
                    }
                    // Straddles `from`; skip past it.
                    p = r.start + r.length;
                    continue;
                }
            }
            // Stale slot left behind by a merge or carve.
            p = slot + 1;
        }
    }

    pub(crate) fn small_span_stats(&self) -> SmallSpanStats {
        let mut out = SmallSpanStats::default();
        for (length, _, _) in self.normal.iter() {
            if length < MAX_PAGES {
                out.normal_count += 1;
            }
        }
        for (length, _, _) in self.returned.iter() {
            if length < MAX_PAGES {
                out.returned_count += 1;
            }
        }
        out
    }

    pub(crate) fn large_span_stats(&self) -> LargeSpanStats {
        let mut out = LargeSpanStats::default();
        for (length, _, _) in self.normal.iter() {
            if length >= MAX_PAGES {
                out.spans += 1;
                out.normal_pages += length as u64;
            }
        }
        for (length, _, _) in self.returned.iter() {
            if length >= MAX_PAGES {
                out.spans += 1;
                out.returned_pages += length as u64;
            }
        }
        out
    }
}
