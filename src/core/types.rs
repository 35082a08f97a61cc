/*!
 * Core Types
 * Common types used across the heap
 */

/// Page number: the page's base address shifted right by `PAGE_SHIFT`
pub type PageId = usize;

/// A count of pages
pub type Length = usize;

/// Size-class tag assigned by the front-end; 0 means "free or single large object"
pub type SizeClass = u32;
