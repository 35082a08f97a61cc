/*!
 * Heap Statistics
 * Byte accounting and span census types
 */

use serde::{Deserialize, Serialize};

/// Byte-level accounting for the heap
///
/// Identities maintained under the heap lock:
/// `committed_bytes + unmapped_bytes == system_bytes`, and
/// `free_bytes + unmapped_bytes + in-use bytes == system_bytes`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapStats {
    /// Total bytes obtained from the system; monotone non-decreasing
    pub system_bytes: u64,
    /// Bytes sitting on the normal free index
    pub free_bytes: u64,
    /// Bytes sitting on the returned free index
    pub unmapped_bytes: u64,
    /// Bytes with physical backing; always <= system_bytes
    pub committed_bytes: u64,

    /// Times the incremental scavenger released a span
    pub scavenge_count: u64,

    /// Number of commit operations issued
    pub commit_count: u64,
    /// Bytes committed over the heap's lifetime
    pub total_commit_bytes: u64,
    /// Number of decommit operations issued
    pub decommit_count: u64,
    /// Bytes decommitted over the heap's lifetime
    pub total_decommit_bytes: u64,

    /// Number of reservations obtained from the system
    pub reserve_count: u64,
    /// Bytes reserved over the heap's lifetime
    pub total_reserve_bytes: u64,
}

/// Census of free spans shorter than `MAX_PAGES`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmallSpanStats {
    /// Number of small spans on the normal index
    pub normal_count: u64,
    /// Number of small spans on the returned index
    pub returned_count: u64,
}

/// Census of free spans of `MAX_PAGES` or longer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeSpanStats {
    /// Number of large free spans across both indices
    pub spans: u64,
    /// Combined page count of large normal spans
    pub normal_pages: u64,
    /// Combined page count of large returned spans
    pub returned_pages: u64,
}
