/*!
 * Free-Span Index
 * Ordered multiset of free spans keyed by (length, start)
 */

use crate::core::types::{Length, PageId};
use crate::heap::span::SpanId;
use std::collections::BTreeMap;

/// One per span location: best-fit lookup in O(log n), with the secondary
/// key on the start page making tie-breaks deterministic
#[derive(Debug, Default)]
pub(crate) struct FreeIndex {
    spans: BTreeMap<(Length, PageId), SpanId>,
}

impl FreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, length: Length, start: PageId, id: SpanId) {
        let prev = self.spans.insert((length, start), id);
        debug_assert!(prev.is_none(), "free span {:#x}/{} indexed twice", start, length);
    }

    pub fn remove(&mut self, length: Length, start: PageId) -> Option<SpanId> {
        self.spans.remove(&(length, start))
    }

    /// Smallest span with `length >= n`; ties broken by smallest start
    pub fn best_fit(&self, n: Length) -> Option<(Length, PageId, SpanId)> {
        self.spans
            .range((n, 0)..)
            .next()
            .map(|(&(len, start), &id)| (len, start, id))
    }

    /// Longest span in the index; the release policy's candidate
    pub fn largest(&self) -> Option<(Length, PageId, SpanId)> {
        self.spans
            .iter()
            .next_back()
            .map(|(&(len, start), &id)| (len, start, id))
    }

    /// Total pages across all indexed spans
    pub fn total_pages(&self) -> Length {
        self.spans.keys().map(|&(len, _)| len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Length, PageId, SpanId)> + '_ {
        self.spans.iter().map(|(&(len, start), &id)| (len, start, id))
    }
}
