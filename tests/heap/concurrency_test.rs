/*!
 * Concurrency Tests
 * Parallel mutators over the shared heap and the lock-free cache
 */

use super::common::new_heap;
use page_heap::{PageHeap, SimSource};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_allocations() {
    let source = Arc::new(SimSource::new());
    let heap = Arc::new(PageHeap::with_source(Arc::clone(&source)));
    let mut handles = vec![];

    for i in 0..8usize {
        let heap_clone = Arc::clone(&heap);
        let handle = thread::spawn(move || {
            let mut held = Vec::new();
            for j in 0..100usize {
                let n = 1 + (i + j) % 7;
                let s = heap_clone.allocate(n).unwrap();
                assert_eq!(s.length, n);
                if j % 3 == 0 {
                    held.push(s);
                } else {
                    heap_clone.deallocate(s).unwrap();
                }
            }
            for s in held {
                heap_clone.deallocate(s).unwrap();
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // All threads returned everything; the heap must be coherent and
    // fully free.
    assert!(heap.check_expensive());
    let stats = heap.stats();
    assert_eq!(stats.free_bytes + stats.unmapped_bytes, stats.system_bytes);
}

#[test]
fn test_cache_is_safe_under_races() {
    let (_, heap) = new_heap();
    let heap = Arc::new(heap);
    let base = heap.allocate(64).unwrap().start;

    let mut handles = vec![];
    for t in 0..4usize {
        let heap_clone = Arc::clone(&heap);
        handles.push(thread::spawn(move || {
            for round in 0..1000usize {
                let p = base + (t * 16 + round) % 64;
                let sc = 1 + (p % 100) as u32;
                heap_clone.set_cached_size_class(p, sc);
                // Racy reads may miss, but a hit is never torn: the value
                // always belongs to the queried page.
                if let Some(v) = heap_clone.try_size_class(p) {
                    assert_eq!(v, sc);
                }
                heap_clone.invalidate_cached_size_class(p);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}
