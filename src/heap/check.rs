/*!
 * Invariant Audits
 * Cheap and expensive self-checks for tests and debugging
 */

use super::free_index::FreeIndex;
use super::span::SpanLocation;
use super::HeapCore;
use crate::core::limits::pages_to_bytes;
use crate::sys::SystemSource;
use log::error;

impl<S: SystemSource> HeapCore<S> {
    /// Byte-accounting identities; logs and returns false on violation
    pub(crate) fn check(&self) -> bool {
        let mut ok = true;

        if self.stats.committed_bytes + self.stats.unmapped_bytes != self.stats.system_bytes {
            error!(
                "byte accounting broken: committed {} + unmapped {} != system {}",
                self.stats.committed_bytes, self.stats.unmapped_bytes, self.stats.system_bytes
            );
            ok = false;
        }
        let normal_bytes = pages_to_bytes(self.normal.total_pages());
        if self.stats.free_bytes != normal_bytes {
            error!(
                "free_bytes {} disagrees with normal index contents {}",
                self.stats.free_bytes, normal_bytes
            );
            ok = false;
        }
        let returned_bytes = pages_to_bytes(self.returned.total_pages());
        if self.stats.unmapped_bytes != returned_bytes {
            error!(
                "unmapped_bytes {} disagrees with returned index contents {}",
                self.stats.unmapped_bytes, returned_bytes
            );
            ok = false;
        }

        ok
    }

    /// Everything `check` covers plus a full walk of both indices against
    /// the arena and the directory, and of the arena against the indices
    pub(crate) fn check_expensive(&self) -> bool {
        let mut ok = self.check();
        ok &= self.check_index(&self.normal, SpanLocation::OnNormalList);
        ok &= self.check_index(&self.returned, SpanLocation::OnReturnedList);

        // Every free record must sit in the index its location claims;
        // anything else leaked out of the bookkeeping.
        for (id, r) in self.arena.live_spans() {
            let indexed = match r.location {
                SpanLocation::InUse => continue,
                SpanLocation::OnNormalList => self.normal.iter().any(|(_, _, i)| i == id),
                SpanLocation::OnReturnedList => self.returned.iter().any(|(_, _, i)| i == id),
            };
            if !indexed {
                error!(
                    "free span at page {:#x} ({} pages, {}) is missing from its index",
                    r.start, r.length, r.location
                );
                ok = false;
            }
        }
        ok
    }

    fn check_index(&self, index: &FreeIndex, location: SpanLocation) -> bool {
        let mut ok = true;
        for (length, start, id) in index.iter() {
            let Some(r) = self.arena.get(id) else {
                error!("{} index holds a dead span record at page {:#x}", location, start);
                ok = false;
                continue;
            };
            if r.start != start || r.length != length || r.location != location {
                error!(
                    "{} index entry ({:#x}, {}) disagrees with record ({:#x}, {}, {})",
                    location, start, length, r.start, r.length, r.location
                );
                ok = false;
            }
            if r.sizeclass != 0 {
                error!("free span at page {:#x} still carries size class {}", start, r.sizeclass);
                ok = false;
            }
            if self.directory.get(start) != Some(id)
                || (length > 1 && self.directory.get(start + length - 1) != Some(id))
            {
                error!("span at page {:#x} missing its directory endpoints", start);
                ok = false;
            }
            // Coalescing is eager: a same-location free neighbor means a
            // merge was skipped.
            if start > 0 {
                if let Some(left) = self.owner_of(start - 1) {
                    if left != id && self.record(left).location == location {
                        error!(
                            "adjacent {} spans at pages {:#x} and {:#x} escaped coalescing",
                            location,
                            self.record(left).start,
                            start
                        );
                        ok = false;
                    }
                }
            }
        }
        ok
    }
}
