/*!
 * Shared test fixtures
 */

use page_heap::{PageHeap, SimSource};
use std::sync::Arc;

/// Heap over a simulated address space, with the source handle kept for
/// failure injection and syscall counting
pub fn new_heap() -> (Arc<SimSource>, PageHeap<Arc<SimSource>>) {
    let source = Arc::new(SimSource::new());
    let heap = PageHeap::with_source(Arc::clone(&source));
    (source, heap)
}
