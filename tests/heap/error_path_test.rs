/*!
 * Error Path Tests
 * Failure injection through the simulated system source
 */

use super::common::new_heap;
use page_heap::limits::PAGE_SIZE;
use page_heap::{HeapError, HeapStats, SpanLocation};
use pretty_assertions::assert_eq;

const PAGE: u64 = PAGE_SIZE as u64;

#[test]
fn test_oom_on_growth_leaves_state_unchanged() {
    let (source, heap) = new_heap();

    source.fail_next_allocs(1);
    let err = heap.allocate(4).unwrap_err();
    assert!(matches!(err, HeapError::OutOfMemory { requested: 4, .. }));

    // Nothing changed: no bytes, no spans, no counters.
    assert_eq!(heap.stats(), HeapStats::default());
    assert!(heap.check_expensive());

    // The heap recovers once the system does.
    let s = heap.allocate(4).unwrap();
    assert_eq!(s.length, 4);
}

#[test]
fn test_oom_exhausts_both_ask_sizes() {
    let (source, heap) = new_heap();

    // A 1-page request over-asks to MIN_SYSTEM_ALLOC first, then retries
    // with exactly one page; both must fail for the allocation to fail.
    source.fail_next_allocs(2);
    assert!(heap.allocate(1).is_err());
    assert_eq!(source.alloc_calls(), 2);

    source.fail_next_allocs(1);
    let s = heap.allocate(1).unwrap();
    assert_eq!(s.length, 1);
}

#[test]
fn test_commit_failure_falls_through_to_growth() {
    let (source, heap) = new_heap();

    let a = heap.allocate(4).unwrap();
    heap.deallocate(a).unwrap();
    assert_eq!(heap.release_at_least(4), 4);

    source.set_commit_fails(true);
    let before = heap.stats();
    // The returned span best-fits, its commit fails, and growth serves the
    // request instead.
    let b = heap.allocate(2).unwrap();
    let after = heap.stats();

    assert_ne!(b.start, a.start);
    assert_eq!(after.unmapped_bytes, before.unmapped_bytes);
    // Only the growth itself committed anything; the returned span did not.
    assert_eq!(after.commit_count, before.commit_count + 1);
    assert!(after.system_bytes > before.system_bytes);
    assert!(heap.check_expensive());

    // With commits working again the returned span is reusable.
    source.set_commit_fails(false);
    let c = heap.allocate(4).unwrap();
    assert_eq!(c.start, a.start);
}

#[test]
fn test_decommit_failure_leaves_span_normal() {
    let (source, heap) = new_heap();

    let a = heap.allocate(8).unwrap();
    heap.deallocate(a).unwrap();

    source.set_decommit_fails(true);
    assert_eq!(heap.release_at_least(8), 0);

    let stats = heap.stats();
    assert_eq!(stats.decommit_count, 0);
    assert_eq!(stats.unmapped_bytes, 0);
    assert_eq!(stats.free_bytes, 8 * PAGE);
    let span = heap.descriptor(a.start).unwrap();
    assert_eq!(heap.location(span), Some(SpanLocation::OnNormalList));
    assert!(heap.check_expensive());

    source.set_decommit_fails(false);
    assert_eq!(heap.release_at_least(8), 8);
    assert_eq!(heap.stats().unmapped_bytes, 8 * PAGE);
    // The successful release also issued the stronger OS hint.
    assert_eq!(source.release_calls(), 1);
}

#[test]
fn test_limit_blocks_growth_until_release_restores_headroom() {
    let (_, heap) = new_heap();
    heap.set_limit(Some(16 * PAGE));
    assert_eq!(heap.limit(), Some(16 * PAGE));

    let a = heap.allocate(8).unwrap();
    let _b = heap.allocate(8).unwrap();

    // The working set is at the ceiling and nothing is releasable.
    assert!(matches!(heap.allocate(4), Err(HeapError::OutOfMemory { .. })));

    // Freeing a gives the limit check something to release, but 12 pages
    // still cannot fit under the ceiling alongside the 8 in use.
    heap.deallocate(a).unwrap();
    assert!(heap.allocate(12).is_err());
    // The failed attempt released a's pages while trying.
    assert_eq!(heap.stats().unmapped_bytes, 8 * PAGE);

    // A 4-page request fits: served from the released span, no growth.
    let before = heap.stats();
    let c = heap.allocate(4).unwrap();
    assert_eq!(c.start, a.start);
    assert_eq!(heap.stats().system_bytes, before.system_bytes);
    assert!(heap.check_expensive());
}

#[test]
fn test_uncommitted_growth_is_committed_on_carve() {
    let (source, heap) = new_heap();
    source.set_committed_allocs(false);

    let s = heap.allocate(4).unwrap();
    assert_eq!(s.length, 4);

    let stats = heap.stats();
    assert_eq!(stats.system_bytes, 4 * PAGE);
    assert_eq!(stats.commit_count, 1);
    assert_eq!(stats.committed_bytes, 4 * PAGE);
    assert_eq!(stats.unmapped_bytes, 0);
    assert!(heap.check_expensive());
}
