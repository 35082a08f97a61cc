/*!
 * Size-Class Cache
 * Lossy direct-mapped accelerator for the deallocation fast path
 *
 * Each slot is one atomic word packing (page, stamp, size class). Readers
 * and writers never take the heap lock; races surface as stale or missing
 * entries, which callers resolve against the span directory. The cache is
 * never consulted for correctness.
 */

use crate::core::limits::{MAX_SIZE_CLASS, SIZE_CLASS_CACHE_BITS};
use crate::core::types::{PageId, SizeClass};
use std::sync::atomic::{AtomicU64, Ordering};

const SLOT_COUNT: usize = 1 << SIZE_CLASS_CACHE_BITS;
const SLOT_MASK: usize = SLOT_COUNT - 1;

/// Bit 7 is the stamp distinguishing "present" from "empty"; bits 0..7 hold
/// the size class and the page occupies the rest of the word
const STAMP: u64 = 1 << 7;
const VALUE_MASK: u64 = STAMP - 1;

pub(crate) struct SizeClassCache {
    slots: Box<[AtomicU64]>,
}

impl SizeClassCache {
    pub fn new() -> Self {
        let slots = (0..SLOT_COUNT).map(|_| AtomicU64::new(0)).collect();
        Self { slots }
    }

    #[inline]
    fn slot(&self, p: PageId) -> &AtomicU64 {
        &self.slots[p & SLOT_MASK]
    }

    #[inline]
    fn pack(p: PageId, sc: SizeClass) -> u64 {
        ((p as u64) << 8) | STAMP | sc as u64
    }

    /// Lock-free lookup; `None` on miss or on a slot owned by another page
    #[inline]
    pub fn try_get(&self, p: PageId) -> Option<SizeClass> {
        let entry = self.slot(p).load(Ordering::Relaxed);
        if entry & STAMP != 0 && entry >> 8 == p as u64 {
            Some((entry & VALUE_MASK) as SizeClass)
        } else {
            None
        }
    }

    /// Overwrite the slot unconditionally
    ///
    /// Size class 0 is the sentinel for "unknown" and must never be cached.
    #[inline]
    pub fn put(&self, p: PageId, sc: SizeClass) {
        debug_assert!(sc != 0 && sc <= MAX_SIZE_CLASS);
        self.slot(p).store(Self::pack(p, sc), Ordering::Relaxed);
    }

    /// Clear the entry for `p` if present
    ///
    /// The check-then-store pair can race with a concurrent `put` for a
    /// colliding page; losing that entry is fine, the cache is lossy.
    #[inline]
    pub fn invalidate(&self, p: PageId) {
        let slot = self.slot(p);
        let entry = slot.load(Ordering::Relaxed);
        if entry & STAMP != 0 && entry >> 8 == p as u64 {
            slot.store(0, Ordering::Relaxed);
        }
    }

    /// Invalidate every page of a span
    ///
    /// Pages past `SLOT_COUNT` revisit slots already cleared, so the walk is
    /// capped at one pass over the cache.
    pub fn invalidate_range(&self, start: PageId, length: usize) {
        let span = length.min(SLOT_COUNT);
        for p in start..start + span {
            self.invalidate(p);
        }
    }
}
