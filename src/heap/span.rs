/*!
 * Span Types
 * Span descriptors and the per-heap record arena
 */

use crate::core::types::{Length, PageId, SizeClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal span record identifier; an index into the heap's arena
pub(crate) type SpanId = u32;

/// Ownership state of a span's pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanLocation {
    /// Held by a caller of `allocate`
    InUse,
    /// Free with committed pages, ready for immediate reuse
    OnNormalList,
    /// Free with pages handed back to the OS; faultable until re-committed
    OnReturnedList,
}

impl fmt::Display for SpanLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SpanLocation::InUse => write!(f, "IN_USE"),
            SpanLocation::OnNormalList => write!(f, "NORMAL"),
            SpanLocation::OnReturnedList => write!(f, "RETURNED"),
        }
    }
}

/// Caller-facing descriptor of a contiguous run of pages
///
/// A snapshot: `start` and `length` reflect the span at the time the heap
/// handed it out. Only the heap can mint these; mutating operations validate
/// the descriptor against the live record and reject stale or foreign ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: PageId,
    pub length: Length,
    pub(crate) id: SpanId,
}

/// Live bookkeeping for one span, owned by the arena
#[derive(Debug, Clone)]
pub(crate) struct SpanRecord {
    pub start: PageId,
    pub length: Length,
    pub location: SpanLocation,
    pub sizeclass: SizeClass,
}

/// Arena of span records with a free pool
///
/// Records destroyed by coalescing are recycled rather than returned to the
/// global allocator, so steady-state delete/merge churn allocates nothing.
#[derive(Debug, Default)]
pub(crate) struct SpanArena {
    records: Vec<Option<SpanRecord>>,
    free_pool: Vec<SpanId>,
}

impl SpanArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, start: PageId, length: Length, location: SpanLocation) -> SpanId {
        let record = SpanRecord {
            start,
            length,
            location,
            sizeclass: 0,
        };
        match self.free_pool.pop() {
            Some(id) => {
                self.records[id as usize] = Some(record);
                id
            }
            None => {
                let id = self.records.len() as SpanId;
                self.records.push(Some(record));
                id
            }
        }
    }

    pub fn get(&self, id: SpanId) -> Option<&SpanRecord> {
        self.records.get(id as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: SpanId) -> Option<&mut SpanRecord> {
        self.records.get_mut(id as usize)?.as_mut()
    }

    /// Destroy a record and recycle its slot
    pub fn remove(&mut self, id: SpanId) {
        if let Some(slot) = self.records.get_mut(id as usize) {
            if slot.take().is_some() {
                self.free_pool.push(id);
            }
        }
    }

    pub fn live_spans(&self) -> impl Iterator<Item = (SpanId, &SpanRecord)> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|r| (id as SpanId, r)))
    }
}
