/*!
 * Page Heap
 *
 * Arbiter between the system's virtual-memory primitives and the size-class
 * front-end. Hands out spans of contiguous pages, coalesces eagerly on
 * release, and scavenges idle memory back to the system on an amortized
 * schedule.
 *
 * ## Concurrency
 *
 * One coarse lock guards the indices, the directory, and the statistics;
 * operations linearize at acquisition. Commit and decommit syscalls happen
 * while holding the lock so a span's committed state and its index
 * membership can never drift apart. The size-class cache is the sole
 * lock-free structure.
 */

mod alloc;
mod cache;
mod check;
mod dealloc;
mod directory;
mod free_index;
mod introspect;
mod scavenge;
mod span;
mod stats;

pub use span::{Span, SpanLocation};
pub use stats::{HeapStats, LargeSpanStats, SmallSpanStats};

use crate::core::errors::{HeapError, HeapResult};
use crate::core::limits::{
    pages_to_bytes, DEFAULT_RELEASE_DELAY, MAX_SIZE_CLASS, PAGE_SHIFT, PAGE_SIZE,
};
use crate::core::types::{Length, PageId, SizeClass};
use crate::sys::SystemSource;
use cache::SizeClassCache;
use directory::SpanDirectory;
use free_index::FreeIndex;
use log::info;
use parking_lot::Mutex;
use span::{SpanArena, SpanId, SpanRecord};

/// Heap state guarded by the page heap lock
pub(crate) struct HeapCore<S: SystemSource> {
    source: S,
    arena: SpanArena,
    directory: SpanDirectory,
    normal: FreeIndex,
    returned: FreeIndex,
    stats: HeapStats,
    /// Pages left to deallocate before the scavenger runs again
    scavenge_counter: i64,
    aggressive_decommit: bool,
    limit_bytes: Option<u64>,
}

/// Page-level span allocator
///
/// Public operations take `&self`; each acquires the heap lock for the
/// duration of the call. See [`crate::sys::SystemSource`] for the memory
/// provider contract.
pub struct PageHeap<S: SystemSource> {
    inner: Mutex<HeapCore<S>>,
    cache: SizeClassCache,
}

impl<S: SystemSource> PageHeap<S> {
    pub fn with_source(source: S) -> Self {
        info!(
            "page heap initialized: {}-byte pages, scavenge delay {} pages",
            PAGE_SIZE, DEFAULT_RELEASE_DELAY
        );
        Self {
            inner: Mutex::new(HeapCore {
                source,
                arena: SpanArena::new(),
                directory: SpanDirectory::new(),
                normal: FreeIndex::new(),
                returned: FreeIndex::new(),
                stats: HeapStats::default(),
                scavenge_counter: DEFAULT_RELEASE_DELAY,
                aggressive_decommit: false,
                limit_bytes: None,
            }),
            cache: SizeClassCache::new(),
        }
    }

    pub fn new() -> Self
    where
        S: Default,
    {
        Self::with_source(S::default())
    }

    /// Allocate a run of `n >= 1` pages
    pub fn allocate(&self, n: Length) -> HeapResult<Span> {
        if n == 0 {
            return Err(HeapError::InvalidLength(0));
        }
        let span = self.inner.lock().allocate(n)?;
        self.cache.invalidate_range(span.start, span.length);
        Ok(span)
    }

    /// Return a span obtained from `allocate`; coalesces with free
    /// neighbors and may trigger the incremental scavenger
    pub fn deallocate(&self, span: Span) -> HeapResult<()> {
        self.cache.invalidate_range(span.start, span.length);
        self.inner.lock().deallocate(span)
    }

    /// Trim `span` to `n` pages and return the in-use remainder as a new
    /// span. Requires `0 < n < span.length` and an unregistered span.
    pub fn split(&self, span: Span, n: Length) -> HeapResult<Span> {
        self.inner.lock().split(span, n)
    }

    /// Tag an allocated span with a front-end size class and map every one
    /// of its pages back to it in the directory
    pub fn register_size_class(&self, span: Span, sc: SizeClass) -> HeapResult<()> {
        self.inner.lock().register_size_class(span, sc)
    }

    /// Span owning page `p`, if any
    pub fn descriptor(&self, p: PageId) -> Option<Span> {
        self.inner.lock().descriptor(p)
    }

    /// Current location of a span, or `None` for a stale descriptor
    pub fn location(&self, span: Span) -> Option<SpanLocation> {
        self.inner.lock().location_of(span)
    }

    /// First span starting at or after `from`; introspection only
    pub fn next_range(&self, from: PageId) -> Option<Span> {
        self.inner.lock().next_range(from)
    }

    /// Lock-free cached size-class lookup; a miss means "consult the
    /// directory", never "not allocated"
    pub fn try_size_class(&self, p: PageId) -> Option<SizeClass> {
        self.cache.try_get(p)
    }

    /// Lock-free cache fill. Size class 0 is the "unknown" sentinel and is
    /// never cached; out-of-range classes are ignored.
    pub fn set_cached_size_class(&self, p: PageId, sc: SizeClass) {
        debug_assert!(sc != 0 && sc <= MAX_SIZE_CLASS);
        if sc != 0 && sc <= MAX_SIZE_CLASS {
            self.cache.put(p, sc);
        }
    }

    /// Lock-free cache eviction; a no-op for uncached pages
    pub fn invalidate_cached_size_class(&self, p: PageId) {
        self.cache.invalidate(p);
    }

    /// Cached size class, or 0 when unknown
    pub fn cached_size_class_or_zero(&self, p: PageId) -> SizeClass {
        self.cache.try_get(p).unwrap_or(0)
    }

    pub fn stats(&self) -> HeapStats {
        self.inner.lock().stats
    }

    pub fn small_span_stats(&self) -> SmallSpanStats {
        self.inner.lock().small_span_stats()
    }

    pub fn large_span_stats(&self) -> LargeSpanStats {
        self.inner.lock().large_span_stats()
    }

    /// Decommit normal free spans, largest first, until at least `pages`
    /// have been released or none remain. Returns pages actually released,
    /// which can overshoot because spans release atomically.
    pub fn release_at_least(&self, pages: Length) -> Length {
        self.inner.lock().release_at_least(pages)
    }

    /// When set, every deallocation decommits immediately and merges prefer
    /// the returned state
    pub fn set_aggressive_decommit(&self, aggressive: bool) {
        self.inner.lock().aggressive_decommit = aggressive;
    }

    pub fn aggressive_decommit(&self) -> bool {
        self.inner.lock().aggressive_decommit
    }

    /// Optional ceiling on the committed working set, in bytes
    pub fn set_limit(&self, bytes: Option<u64>) {
        self.inner.lock().limit_bytes = bytes;
    }

    pub fn limit(&self) -> Option<u64> {
        self.inner.lock().limit_bytes
    }

    /// Cheap invariant audit; logs and returns false on violation
    pub fn check(&self) -> bool {
        self.inner.lock().check()
    }

    /// Full audit of both free indices against the directory and arena
    pub fn check_expensive(&self) -> bool {
        self.inner.lock().check_expensive()
    }
}

impl<S: SystemSource + Default> Default for PageHeap<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
static PAGE_HEAP: std::sync::OnceLock<PageHeap<crate::sys::MmapSource>> =
    std::sync::OnceLock::new();

/// Process-wide heap over the real virtual-memory interface
///
/// Lazily initialized on first use and never torn down. The mmap shim is
/// constructed before the heap that owns it, so there is no initialization
/// ordering to get wrong.
#[cfg(unix)]
pub fn page_heap() -> &'static PageHeap<crate::sys::MmapSource> {
    PAGE_HEAP.get_or_init(|| PageHeap::with_source(crate::sys::MmapSource::new()))
}

// Shared internal helpers used by the sibling impl files.
impl<S: SystemSource> HeapCore<S> {
    /// Live record for `id`; a dead id here means the bookkeeping is
    /// corrupt, which is unrecoverable
    #[inline]
    fn record(&self, id: SpanId) -> &SpanRecord {
        self.arena.get(id).expect("heap bookkeeping references a dead span record")
    }

    #[inline]
    fn record_mut(&mut self, id: SpanId) -> &mut SpanRecord {
        self.arena
            .get_mut(id)
            .expect("heap bookkeeping references a dead span record")
    }

    /// Write the directory entries for a span's first and last pages
    fn record_span(&mut self, id: SpanId) {
        let (start, length) = {
            let r = self.record(id);
            (r.start, r.length)
        };
        self.directory.set(start, id);
        if length > 1 {
            self.directory.set(start + length - 1, id);
        }
    }

    /// Span owning page `p`, filtered against stale directory entries:
    /// live spans never overlap, so a record covering `p` is its unique
    /// owner
    fn owner_of(&self, p: PageId) -> Option<SpanId> {
        let id = self.directory.get(p)?;
        let r = self.arena.get(id)?;
        if r.start <= p && p < r.start + r.length {
            Some(id)
        } else {
            None
        }
    }

    /// Insert a free span into the index matching its location, adjusting
    /// the byte accounting
    fn prepend_to_free_index(&mut self, id: SpanId) {
        let (start, length, location) = {
            let r = self.record(id);
            (r.start, r.length, r.location)
        };
        let bytes = pages_to_bytes(length);
        match location {
            SpanLocation::OnNormalList => {
                self.normal.insert(length, start, id);
                self.stats.free_bytes += bytes;
            }
            SpanLocation::OnReturnedList => {
                self.returned.insert(length, start, id);
                self.stats.unmapped_bytes += bytes;
            }
            SpanLocation::InUse => debug_assert!(false, "in-use span on a free index"),
        }
    }

    /// Remove a free span from its index, adjusting the byte accounting
    fn remove_from_free_index(&mut self, id: SpanId) {
        let (start, length, location) = {
            let r = self.record(id);
            (r.start, r.length, r.location)
        };
        let bytes = pages_to_bytes(length);
        match location {
            SpanLocation::OnNormalList => {
                self.normal.remove(length, start);
                self.stats.free_bytes -= bytes;
            }
            SpanLocation::OnReturnedList => {
                self.returned.remove(length, start);
                self.stats.unmapped_bytes -= bytes;
            }
            SpanLocation::InUse => debug_assert!(false, "in-use span on a free index"),
        }
    }

    /// Commit a page range, updating counters on success
    fn commit_pages(&mut self, start: PageId, length: Length) -> bool {
        let bytes = pages_to_bytes(length);
        if !self.source.commit(start << PAGE_SHIFT, bytes as usize) {
            return false;
        }
        self.stats.commit_count += 1;
        self.stats.total_commit_bytes += bytes;
        self.stats.committed_bytes += bytes;
        true
    }

    /// Decommit a page range, updating counters on success
    fn decommit_pages(&mut self, start: PageId, length: Length) -> bool {
        let bytes = pages_to_bytes(length);
        if !self.source.decommit(start << PAGE_SHIFT, bytes as usize) {
            return false;
        }
        self.stats.decommit_count += 1;
        self.stats.total_decommit_bytes += bytes;
        self.stats.committed_bytes -= bytes;
        true
    }
}
