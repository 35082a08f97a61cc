/*!
 * Page-Level Heap
 *
 * Manages virtual address space in fixed-size pages and hands out spans
 * (maximal runs of contiguous pages) to a size-class front-end. Three
 * cooperating pieces:
 *
 * - **Span directory**: a radix tree mapping any page number to its owning
 *   span, serving every deallocation; a lossy lock-free cache accelerates
 *   the page-to-size-class fast path.
 * - **Free-span indices**: twin best-fit ordered multisets, one for
 *   committed (normal) spans and one for spans whose pages were handed
 *   back to the OS (returned).
 * - **Heap manager**: allocation, eager coalescing on release, splitting,
 *   growth, an optional working-set ceiling, and an incremental scavenger
 *   that bounds amortized decommit cost.
 */

pub mod core;
pub mod heap;
pub mod sys;

pub use crate::core::errors::{HeapError, HeapResult};
pub use crate::core::limits;
pub use crate::core::types::{Length, PageId, SizeClass};
#[cfg(unix)]
pub use heap::page_heap;
pub use heap::{HeapStats, LargeSpanStats, PageHeap, SmallSpanStats, Span, SpanLocation};
#[cfg(unix)]
pub use sys::MmapSource;
pub use sys::{SimSource, SystemRegion, SystemSource};
