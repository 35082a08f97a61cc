/*!
 * Incremental Scavenger
 * Amortized return of idle spans to the operating system
 */

use super::span::{SpanId, SpanLocation};
use super::HeapCore;
use crate::core::limits::{pages_to_bytes, DEFAULT_RELEASE_DELAY, MAX_RELEASE_DELAY, PAGE_SHIFT};
use crate::core::types::Length;
use crate::sys::SystemSource;
use log::{debug, warn};

impl<S: SystemSource> HeapCore<S> {
    /// Called on every deallocation of `n` pages. Charges the counter and,
    /// once it is exhausted, releases one candidate span; the counter then
    /// advances in proportion to the work done so decommit syscall cost
    /// stays amortized across deallocations.
    pub(super) fn incremental_scavenge(&mut self, n: Length) {
        self.scavenge_counter -= n as i64;
        if self.scavenge_counter > 0 {
            return;
        }

        if let Some((_, _, id)) = self.normal.largest() {
            let released = self.release_span(id);
            if released > 0 {
                self.stats.scavenge_count += 1;
                self.scavenge_counter =
                    (self.scavenge_counter + released as i64).min(MAX_RELEASE_DELAY);
                return;
            }
        }

        // Nothing to release; wait a while before looking again.
        self.scavenge_counter = DEFAULT_RELEASE_DELAY;
    }

    /// Decommit a normal free span and move it to the returned index,
    /// coalescing with any returned neighbors. Returns the span's length,
    /// or 0 when the system refuses the decommit.
    fn release_span(&mut self, id: SpanId) -> Length {
        debug_assert_eq!(self.record(id).location, SpanLocation::OnNormalList);

        self.remove_from_free_index(id);
        let (start, length) = {
            let r = self.record(id);
            (r.start, r.length)
        };
        if !self.decommit_pages(start, length) {
            warn!(
                "decommit of {} pages at page {:#x} refused; span stays resident",
                length, start
            );
            self.prepend_to_free_index(id);
            return 0;
        }

        // The span is idle for the long haul; follow the decommit with the
        // stronger release hint, which some platforms treat as a no-op.
        self.source
            .release(start << PAGE_SHIFT, pages_to_bytes(length) as usize);

        self.record_mut(id).location = SpanLocation::OnReturnedList;
        self.merge_into_free_index(id);
        debug!("released {} pages at page {:#x}", length, start);
        length
    }

    /// Release normal spans, largest first, until at least `pages` are
    /// gone or no candidate remains
    pub(crate) fn release_at_least(&mut self, pages: Length) -> Length {
        let mut released = 0;
        while released < pages {
            let Some((_, _, id)) = self.normal.largest() else {
                break;
            };
            let got = self.release_span(id);
            if got == 0 {
                break;
            }
            released += got;
        }
        released
    }
}
