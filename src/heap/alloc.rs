/*!
 * Allocation Path
 * Best-fit search, carving, and heap growth
 */

use super::span::{Span, SpanId, SpanLocation};
use super::HeapCore;
use crate::core::errors::{HeapError, HeapResult};
use crate::core::limits::{
    bytes_to_pages, pages_to_bytes, DIRECTORY_PREALLOC_THRESHOLD, MAX_VALID_PAGES,
    MIN_SYSTEM_ALLOC, PAGE_SHIFT, PAGE_SIZE,
};
use crate::core::types::Length;
use crate::sys::SystemSource;
use log::{error, info, warn};

impl<S: SystemSource> HeapCore<S> {
    pub(crate) fn allocate(&mut self, n: Length) -> HeapResult<Span> {
        debug_assert!(n >= 1);
        if let Some(span) = self.allocate_from_indices(n) {
            return Ok(span);
        }
        if self.grow_heap(n) {
            if let Some(span) = self.allocate_from_indices(n) {
                return Ok(span);
            }
        }
        error!(
            "page heap exhausted: {} pages requested, {} system bytes held",
            n, self.stats.system_bytes
        );
        Err(HeapError::OutOfMemory {
            requested: n,
            system_bytes: self.stats.system_bytes,
        })
    }

    /// Best-fit over the normal index, then the returned index. A returned
    /// hit pays a commit for the carved portion before use.
    fn allocate_from_indices(&mut self, n: Length) -> Option<Span> {
        if let Some((_, _, id)) = self.normal.best_fit(n) {
            self.remove_from_free_index(id);
            return Some(self.carve(id, n));
        }

        if let Some((_, start, id)) = self.returned.best_fit(n) {
            self.remove_from_free_index(id);
            // Commit what will be handed out before restructuring anything,
            // so a refusal leaves the span exactly as it was.
            if !self.commit_pages(start, n) {
                warn!(
                    "commit of {} pages at page {:#x} refused; falling back to growth",
                    n, start
                );
                self.prepend_to_free_index(id);
                return None;
            }
            return Some(self.carve(id, n));
        }

        None
    }

    /// Take the first `n` pages of a free span already removed from its
    /// index; the remainder, if any, goes back where it came from
    fn carve(&mut self, id: SpanId, n: Length) -> Span {
        let (start, length, old_location) = {
            let r = self.record(id);
            (r.start, r.length, r.location)
        };
        debug_assert!(old_location != SpanLocation::InUse && length >= n);

        let extra = length - n;
        if extra > 0 {
            let leftover = self.arena.insert(start + n, extra, old_location);
            self.record_span(leftover);
            self.prepend_to_free_index(leftover);
        }

        {
            let r = self.record_mut(id);
            r.length = n;
            r.location = SpanLocation::InUse;
            r.sizeclass = 0;
        }
        self.record_span(id);

        Span { start, length: n, id }
    }

    /// Obtain fresh address space covering at least `n` pages and feed it
    /// into the free indices, merging with any adjacent free span the
    /// system happened to place it next to
    fn grow_heap(&mut self, n: Length) -> bool {
        if n > MAX_VALID_PAGES {
            return false;
        }

        // Over-ask to amortize syscalls; fall back to the exact request if
        // the system or the ceiling refuses the larger one.
        let mut ask = n.max(MIN_SYSTEM_ALLOC);
        let mut region = None;
        if self.ensure_limit(ask, true) {
            region = self.source.alloc(pages_to_bytes(ask) as usize, PAGE_SIZE);
        }
        if region.is_none() && n < ask {
            ask = n;
            if self.ensure_limit(ask, true) {
                region = self.source.alloc(pages_to_bytes(ask) as usize, PAGE_SIZE);
            }
        }
        let Some(region) = region else {
            warn!("system refused a reservation of {} pages", ask);
            return false;
        };
        debug_assert_eq!(region.addr % PAGE_SIZE, 0);

        let got = region.bytes >> PAGE_SHIFT;
        let p = region.addr >> PAGE_SHIFT;

        // One page of slack either side lets coalescing probe neighbors
        // without bounds checks.
        if !self.directory.ensure(p.saturating_sub(1), got + 2) {
            error!(
                "span directory cannot cover {} pages at page {:#x}; reservation leaked",
                got, p
            );
            return false;
        }

        let bytes = pages_to_bytes(got);
        let old_system = self.stats.system_bytes;
        self.stats.system_bytes += bytes;
        self.stats.reserve_count += 1;
        self.stats.total_reserve_bytes += bytes;
        if region.committed {
            self.stats.committed_bytes += bytes;
            self.stats.commit_count += 1;
            self.stats.total_commit_bytes += bytes;
        }

        if old_system < DIRECTORY_PREALLOC_THRESHOLD
            && self.stats.system_bytes >= DIRECTORY_PREALLOC_THRESHOLD
        {
            self.directory.preallocate_more();
        }

        info!(
            "heap grew by {} pages at {:#x} ({} system bytes total)",
            got, region.addr, self.stats.system_bytes
        );

        let location = if region.committed {
            SpanLocation::OnNormalList
        } else {
            SpanLocation::OnReturnedList
        };
        let id = self.arena.insert(p, got, location);
        self.record_span(id);
        self.merge_into_free_index(id);
        true
    }

    /// True when adding `n` pages keeps the committed working set within
    /// the configured ceiling. Decommitted reservations do not count, so
    /// releasing idle spans (when allowed) can restore headroom.
    pub(super) fn ensure_limit(&mut self, n: Length, allow_release: bool) -> bool {
        let Some(limit) = self.limit_bytes else {
            return true;
        };
        let taken = self.stats.system_bytes - self.stats.unmapped_bytes;
        let need = taken + pages_to_bytes(n);
        if need <= limit {
            return true;
        }
        if !allow_release {
            return false;
        }
        self.release_at_least(bytes_to_pages((need - limit) as usize));
        self.stats.system_bytes - self.stats.unmapped_bytes + pages_to_bytes(n) <= limit
    }
}
