/*!
 * Mmap System Source
 * Anonymous-mapping implementation of the system boundary for Unix
 */

use super::{SystemRegion, SystemSource};
use crate::core::limits::PAGE_SIZE;
use log::warn;
use std::ffi::c_void;
use std::ptr;

/// Virtual memory backed by `mmap`/`madvise`
///
/// Reservations are anonymous private mappings, handed out committed: the
/// kernel backs them lazily on first touch. Decommit maps to
/// `MADV_DONTNEED`, which drops the backing while keeping the reservation,
/// so a later commit is free.
pub struct MmapSource {
    sys_page_size: usize,
}

impl MmapSource {
    pub fn new() -> Self {
        let sys_page_size = unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) as usize };
        // Heap pages must be a whole number of system pages or the madvise
        // ranges below would straddle page boundaries.
        assert!(
            PAGE_SIZE % sys_page_size == 0,
            "heap page size {} is not a multiple of the system page size {}",
            PAGE_SIZE,
            sys_page_size
        );
        Self { sys_page_size }
    }

    pub fn sys_page_size(&self) -> usize {
        self.sys_page_size
    }
}

impl Default for MmapSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSource for MmapSource {
    fn alloc(&self, bytes: usize, alignment: usize) -> Option<SystemRegion> {
        // Over-reserve by the alignment, then trim the misaligned head and
        // the surplus tail with munmap. mmap only guarantees system-page
        // alignment, which is usually smaller than a heap page.
        let total = bytes.checked_add(alignment)?;
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                total,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            warn!("mmap of {} bytes failed", total);
            return None;
        }

        let raw = ptr as usize;
        let aligned = (raw + alignment - 1) & !(alignment - 1);
        let head = aligned - raw;
        let tail = total - head - bytes;
        unsafe {
            if head > 0 {
                libc::munmap(ptr, head);
            }
            if tail > 0 {
                libc::munmap((aligned + bytes) as *mut c_void, tail);
            }
        }

        Some(SystemRegion {
            addr: aligned,
            bytes,
            committed: true,
        })
    }

    fn commit(&self, _addr: usize, _bytes: usize) -> bool {
        // Anonymous mappings re-fault on demand after MADV_DONTNEED; there
        // is nothing to do eagerly.
        true
    }

    fn decommit(&self, addr: usize, bytes: usize) -> bool {
        let rc = unsafe { libc::madvise(addr as *mut c_void, bytes, libc::MADV_DONTNEED) };
        if rc != 0 {
            warn!("madvise(MADV_DONTNEED) failed for {} bytes at {:#x}", bytes, addr);
        }
        rc == 0
    }

    fn release(&self, _addr: usize, _bytes: usize) {
        // Decommit already dropped the backing via MADV_DONTNEED; there is
        // no stronger hint that keeps the reservation on this platform.
    }
}
