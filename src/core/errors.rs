/*!
 * Error Types
 * Centralized error handling with thiserror
 */

use crate::core::types::{Length, PageId, SizeClass};
use thiserror::Error;

/// Heap operation result
pub type HeapResult<T> = Result<T, HeapError>;

/// Heap errors
///
/// Every failure is surfaced as a return value. Syscall failures during
/// release are reported through `release_at_least` returning 0 rather than
/// through this enum.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    #[error("out of memory: requested {requested} pages ({system_bytes} system bytes held)")]
    OutOfMemory { requested: Length, system_bytes: u64 },

    #[error("invalid span: page {start:#x} length {length} is not a live in-use span")]
    InvalidSpan { start: PageId, length: Length },

    #[error("invalid page count: {0}")]
    InvalidLength(Length),

    #[error("invalid size class: {0}")]
    InvalidSizeClass(SizeClass),
}
