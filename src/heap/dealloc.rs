/*!
 * Deallocation Path
 * Eager coalescing, splitting, and size-class registration
 */

use super::span::{Span, SpanId, SpanLocation};
use super::HeapCore;
use crate::core::errors::{HeapError, HeapResult};
use crate::core::limits::MAX_SIZE_CLASS;
use crate::core::types::{Length, SizeClass};
use crate::sys::SystemSource;

impl<S: SystemSource> HeapCore<S> {
    pub(crate) fn deallocate(&mut self, span: Span) -> HeapResult<()> {
        let id = span.id;
        match self.arena.get(id) {
            Some(r) if r.start == span.start && r.location == SpanLocation::InUse => {}
            _ => {
                return Err(HeapError::InvalidSpan {
                    start: span.start,
                    length: span.length,
                })
            }
        }

        let n = {
            let r = self.record_mut(id);
            r.sizeclass = 0;
            r.location = SpanLocation::OnNormalList;
            r.length
        };
        self.merge_into_free_index(id);
        self.incremental_scavenge(n);
        Ok(())
    }

    /// Coalesce a free span with its neighbors and insert it into the index
    /// matching its final location
    ///
    /// Neighbors are discovered through the directory, not through pointers
    /// on the span record, so merging needs no linkage surgery.
    pub(super) fn merge_into_free_index(&mut self, id: SpanId) {
        debug_assert!(self.record(id).location != SpanLocation::InUse);

        // Aggressive mode keeps idle memory decommitted: return the span up
        // front so merges preserve returned-ness. A refusal leaves it
        // normal and the merge rules below cope.
        if self.aggressive_decommit && self.record(id).location == SpanLocation::OnNormalList {
            let (start, length) = {
                let r = self.record(id);
                (r.start, r.length)
            };
            if self.decommit_pages(start, length) {
                self.record_mut(id).location = SpanLocation::OnReturnedList;
            }
        }

        let start = self.record(id).start;
        if start > 0 {
            if let Some(left) = self.owner_of(start - 1) {
                self.try_absorb(id, left);
            }
        }

        let (start, length) = {
            let r = self.record(id);
            (r.start, r.length)
        };
        if let Some(right) = self.owner_of(start + length) {
            self.try_absorb(id, right);
        }

        self.prepend_to_free_index(id);
    }

    /// Fold the free neighbor `other` into `id` if their committed states
    /// can be reconciled. `id` is held out of the indices by the caller;
    /// `other` leaves its index and its record dies.
    fn try_absorb(&mut self, id: SpanId, other: SpanId) -> bool {
        if self.record(other).location == SpanLocation::InUse {
            return false;
        }
        self.remove_from_free_index(other);

        if self.record(other).location != self.record(id).location
            && !self.reconcile_locations(id, other)
        {
            self.prepend_to_free_index(other);
            return false;
        }

        let (o_start, o_length) = {
            let r = self.record(other);
            (r.start, r.length)
        };
        {
            let r = self.record_mut(id);
            if o_start < r.start {
                r.start = o_start;
            }
            r.length += o_length;
        }
        self.arena.remove(other);
        self.record_span(id);
        true
    }

    /// Convert one side of a mixed normal/returned pair so both share a
    /// committed state. Aggressive decommit pushes the union toward
    /// returned; otherwise the returned neighbor is re-committed on the
    /// spot and the union stays normal. False when the syscall refuses or
    /// the conversion would undo a release.
    fn reconcile_locations(&mut self, id: SpanId, other: SpanId) -> bool {
        let id_is_normal = self.record(id).location == SpanLocation::OnNormalList;
        let (convert, to) = if self.aggressive_decommit {
            let normal_side = if id_is_normal { id } else { other };
            (normal_side, SpanLocation::OnReturnedList)
        } else if id_is_normal {
            (other, SpanLocation::OnNormalList)
        } else {
            // A span that just went returned never re-commits merely to
            // join a normal neighbor; leave the pair unmerged.
            return false;
        };

        let (start, length) = {
            let r = self.record(convert);
            (r.start, r.length)
        };
        let ok = match to {
            SpanLocation::OnReturnedList => self.decommit_pages(start, length),
            SpanLocation::OnNormalList => self.commit_pages(start, length),
            SpanLocation::InUse => unreachable!(),
        };
        if ok {
            self.record_mut(convert).location = to;
        }
        ok
    }

    /// Trim an in-use span to `n` pages; the remainder becomes a new
    /// in-use span returned to the caller
    pub(crate) fn split(&mut self, span: Span, n: Length) -> HeapResult<Span> {
        let id = span.id;
        let (start, length) = match self.arena.get(id) {
            Some(r)
                if r.start == span.start
                    && r.location == SpanLocation::InUse
                    && r.sizeclass == 0 =>
            {
                (r.start, r.length)
            }
            _ => {
                return Err(HeapError::InvalidSpan {
                    start: span.start,
                    length: span.length,
                })
            }
        };
        if n == 0 || n >= length {
            return Err(HeapError::InvalidLength(n));
        }

        let tail = self.arena.insert(start + n, length - n, SpanLocation::InUse);
        self.record_mut(id).length = n;
        self.record_span(id);
        self.record_span(tail);

        Ok(Span {
            start: start + n,
            length: length - n,
            id: tail,
        })
    }

    /// Tag a span for the front-end and point every interior page at it so
    /// any page of a small-object span resolves back to its descriptor
    pub(crate) fn register_size_class(&mut self, span: Span, sc: SizeClass) -> HeapResult<()> {
        if sc == 0 || sc > MAX_SIZE_CLASS {
            return Err(HeapError::InvalidSizeClass(sc));
        }
        let id = span.id;
        let (start, length) = match self.arena.get(id) {
            Some(r) if r.start == span.start && r.location == SpanLocation::InUse => {
                (r.start, r.length)
            }
            _ => {
                return Err(HeapError::InvalidSpan {
                    start: span.start,
                    length: span.length,
                })
            }
        };

        self.record_mut(id).sizeclass = sc;
        for p in start..start + length {
            self.directory.set(p, id);
        }
        Ok(())
    }
}
