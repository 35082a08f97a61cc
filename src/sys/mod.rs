/*!
 * System Memory Boundary
 * Virtual-memory primitives consumed by the heap
 */

#[cfg(unix)]
mod mmap;
mod sim;

#[cfg(unix)]
pub use mmap::MmapSource;
pub use sim::SimSource;

use std::sync::Arc;

/// A reservation handed back by [`SystemSource::alloc`]
///
/// `bytes` may exceed the request when the source rounds up to its own
/// granularity; `committed` reports whether the pages already have physical
/// backing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemRegion {
    pub addr: usize,
    pub bytes: usize,
    pub committed: bool,
}

/// Provider of virtual address space
///
/// The heap calls these while holding its lock, so implementations must not
/// call back into the heap. Commit and decommit operate on ranges previously
/// handed out by `alloc`; a decommitted range stays reserved and may fault on
/// the next touch until re-committed.
pub trait SystemSource: Send + Sync + 'static {
    /// Reserve (and possibly commit) `bytes` of address space aligned to
    /// `alignment`. Returns `None` when the system refuses.
    fn alloc(&self, bytes: usize, alignment: usize) -> Option<SystemRegion>;

    /// Give a decommitted range physical backing again
    fn commit(&self, addr: usize, bytes: usize) -> bool;

    /// Drop physical backing while keeping the reservation
    fn decommit(&self, addr: usize, bytes: usize) -> bool;

    /// Hint that the range is unlikely to be touched soon; may be a no-op
    fn release(&self, addr: usize, bytes: usize);
}

impl<S: SystemSource> SystemSource for Arc<S> {
    fn alloc(&self, bytes: usize, alignment: usize) -> Option<SystemRegion> {
        (**self).alloc(bytes, alignment)
    }

    fn commit(&self, addr: usize, bytes: usize) -> bool {
        (**self).commit(addr, bytes)
    }

    fn decommit(&self, addr: usize, bytes: usize) -> bool {
        (**self).decommit(addr, bytes)
    }

    fn release(&self, addr: usize, bytes: usize) {
        (**self).release(addr, bytes)
    }
}
