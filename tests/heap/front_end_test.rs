/*!
 * Front-End Interface Tests
 * Splitting, size-class registration, the lossy cache, and introspection
 */

use super::common::new_heap;
use page_heap::{HeapError, SpanLocation};
use pretty_assertions::assert_eq;

#[test]
fn test_split_in_use_span() {
    let (_, heap) = new_heap();

    let s = heap.allocate(10).unwrap();
    let t = heap.split(s, 4).unwrap();

    assert_eq!(t.start, s.start + 4);
    assert_eq!(t.length, 6);
    assert_eq!(heap.location(t), Some(SpanLocation::InUse));
    assert_eq!(heap.descriptor(s.start).unwrap().length, 4);
    assert_eq!(heap.descriptor(t.start), Some(t));

    // Both halves are independently returnable and fuse back together.
    heap.deallocate(t).unwrap();
    heap.deallocate(s).unwrap();
    assert_eq!(heap.descriptor(s.start).unwrap().length, 10);
    assert!(heap.check_expensive());
}

#[test]
fn test_split_rejects_bad_lengths() {
    let (_, heap) = new_heap();

    let s = heap.allocate(3).unwrap();
    assert_eq!(heap.split(s, 0), Err(HeapError::InvalidLength(0)));
    assert_eq!(heap.split(s, 3), Err(HeapError::InvalidLength(3)));
    assert_eq!(heap.split(s, 4), Err(HeapError::InvalidLength(4)));
    // The failed splits left the span whole.
    assert_eq!(heap.descriptor(s.start).unwrap().length, 3);
}

#[test]
fn test_register_size_class_maps_interior_pages() {
    let (_, heap) = new_heap();

    let s = heap.allocate(4).unwrap();
    heap.register_size_class(s, 7).unwrap();

    // Every page of a registered span resolves back to it.
    for p in s.start..s.start + s.length {
        assert_eq!(heap.descriptor(p), Some(s));
    }

    // A registered span cannot be split.
    assert!(matches!(heap.split(s, 2), Err(HeapError::InvalidSpan { .. })));

    heap.deallocate(s).unwrap();
    assert_eq!(heap.location(heap.descriptor(s.start).unwrap()), Some(SpanLocation::OnNormalList));
}

#[test]
fn test_register_size_class_rejects_bad_input() {
    let (_, heap) = new_heap();

    let s = heap.allocate(2).unwrap();
    assert_eq!(heap.register_size_class(s, 0), Err(HeapError::InvalidSizeClass(0)));
    assert_eq!(heap.register_size_class(s, 200), Err(HeapError::InvalidSizeClass(200)));

    heap.deallocate(s).unwrap();
    // Stale descriptor: the span is no longer in use.
    assert!(matches!(
        heap.register_size_class(s, 5),
        Err(HeapError::InvalidSpan { .. })
    ));
}

#[test]
fn test_double_free_is_rejected() {
    let (_, heap) = new_heap();

    let s = heap.allocate(1).unwrap();
    heap.deallocate(s).unwrap();
    assert!(matches!(heap.deallocate(s), Err(HeapError::InvalidSpan { .. })));
}

#[test]
fn test_size_class_cache_roundtrip() {
    let (_, heap) = new_heap();

    let s = heap.allocate(4).unwrap();
    assert_eq!(heap.try_size_class(s.start), None);
    assert_eq!(heap.cached_size_class_or_zero(s.start), 0);

    heap.set_cached_size_class(s.start, 7);
    heap.set_cached_size_class(s.start + 1, 7);
    assert_eq!(heap.try_size_class(s.start), Some(7));
    assert_eq!(heap.cached_size_class_or_zero(s.start + 1), 7);

    heap.invalidate_cached_size_class(s.start + 1);
    assert_eq!(heap.try_size_class(s.start + 1), None);
    // Invalidating an uncached page is a no-op.
    heap.invalidate_cached_size_class(s.start + 2);
    assert_eq!(heap.try_size_class(s.start), Some(7));

    // Deallocation wipes the whole span's cache entries.
    heap.deallocate(s).unwrap();
    assert_eq!(heap.try_size_class(s.start), None);
    assert_eq!(heap.try_size_class(s.start + 1), None);
}

#[test]
fn test_next_range_walks_spans_in_order() {
    let (_, heap) = new_heap();

    let a = heap.allocate(3).unwrap();
    let b = heap.allocate(2).unwrap();
    assert_eq!(b.start, a.start + 3);

    let first = heap.next_range(0).unwrap();
    assert_eq!(first.start, a.start);
    assert_eq!(first.length, 3);

    // From inside a, the next span *starting* at or after the cursor is b.
    let second = heap.next_range(a.start + 1).unwrap();
    assert_eq!(second.start, b.start);

    assert!(heap.next_range(b.start + b.length).is_none());
}
