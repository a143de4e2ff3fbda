//! A pool of page-table entries for a single `(size class, scanned)` pair.
//!
//! A classic segregated-fits segment carries a bump pointer plus a free
//! list per size class. This rendering drops the bump pointer (every slot
//! is tracked by the occupancy bitmap from the start, so there's no
//! distinction between "never touched" and "freed" memory to bump past) and
//! instead finds free slots by walking page-table entries from a
//! remembered cursor, using each entry's bitmap to locate the slot within
//! it. The cursor makes the common case (most recently touched entry still
//! has room) O(1) amortized while the bitmap scan makes the worst case
//! (that entry is full) correct.

use crate::error::Error;
use crate::page_table::PageTableEntry;
use crate::paged_vec::PagedVec;

/// All page-table entries backing one size class, further split by whether
/// this pool's objects are scanned for outgoing pointers (see
/// [`crate::matrix`] for the `(class, scanned)` dispatch this partitions).
pub struct Pool<const S: usize> {
    entries: PagedVec<PageTableEntry<S>>,
    cursor: usize,
    scanned: bool,
}

impl<const S: usize> Pool<S> {
    /// An empty pool; no pages are mapped until the first allocation.
    #[must_use]
    pub const fn new(scanned: bool) -> Self {
        Self {
            entries: PagedVec::new(),
            cursor: 0,
            scanned,
        }
    }

    /// An empty pool whose page table is pre-reserved to hold
    /// `capacity_hint` entries before the first allocation forces a remap.
    /// A hint of `0` behaves exactly like [`Pool::new`].
    pub fn with_capacity_hint(scanned: bool, capacity_hint: usize) -> Result<Self, Error> {
        let mut pool = Self::new(scanned);
        if capacity_hint > 0 {
            pool.entries.reserve(capacity_hint)?;
        }
        Ok(pool)
    }

    /// Whether objects in this pool are scanned for outgoing pointers.
    #[must_use]
    pub const fn scanned(&self) -> bool {
        self.scanned
    }

    /// Number of page-table entries (mapped pages) this pool currently owns.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of entries the backing page table can hold before its next
    /// growth. Mainly useful to confirm [`Pool::with_capacity_hint`] did
    /// what it promised.
    #[must_use]
    pub fn entries_capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Read access to a page-table entry, for collection-side traversal.
    #[must_use]
    pub fn entry(&self, index: usize) -> &PageTableEntry<S> {
        &self.entries[index]
    }

    /// Mutable access to a page-table entry, for collection-side sweeping.
    pub fn entry_mut(&mut self, index: usize) -> &mut PageTableEntry<S> {
        &mut self.entries[index]
    }

    /// Finds the next free slot starting the entry scan at `start`, wrapping
    /// around the whole entry list once. Returns `(entry_index, slot_index)`.
    fn find_free_slot_from(&self, start: usize) -> Option<(usize, usize)> {
        let n = self.entries.len();
        if n == 0 {
            return None;
        }
        for offset in 0..n {
            let idx = (start + offset) % n;
            if let Some(slot) = self.entries[idx].first_free_slot() {
                return Some((idx, slot));
            }
        }
        None
    }

    /// Allocates the next free slot, mapping a fresh page-table entry if
    /// every existing entry is full.
    pub fn allocate_next(&mut self) -> Result<*mut u8, Error> {
        if let Some((entry_idx, slot)) = self.find_free_slot_from(self.cursor) {
            self.cursor = entry_idx;
            // SAFETY: `find_free_slot_from` only returns slots reported free
            // by the entry's own occupancy bitmap.
            return Ok(unsafe { self.entries[entry_idx].claim_slot(slot) });
        }

        let mut entry = PageTableEntry::<S>::new()?;
        // SAFETY: slot 0 of a freshly mapped entry is always free.
        let ptr = unsafe { entry.claim_slot(0) };
        self.entries.push(entry)?;
        self.cursor = self.entries.len() - 1;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            size_class = S,
            scanned = self.scanned,
            entry_count = self.entries.len(),
            "pool grew by one page-table entry"
        );
        Ok(ptr)
    }

    /// Locates the page-table entry and slot owning `ptr`, if any, and
    /// releases it. Returns whether `ptr` was actually found in this pool.
    fn locate_and_release(&mut self, ptr: *const u8) -> bool {
        let found = self
            .entries
            .as_slice()
            .iter()
            .enumerate()
            .find_map(|(idx, entry)| entry.slot_of(ptr).map(|slot| (idx, slot)));
        let Some((idx, slot)) = found else {
            return false;
        };
        self.entries[idx].release_slot(slot);
        if idx < self.cursor {
            self.cursor = idx;
        }
        true
    }

    /// Releases the slot backing `ptr` if this pool owns it; a silent no-op
    /// otherwise. Never forwards `ptr` to any other allocator — the caller
    /// already routed this call to the one pool `ptr`'s size class and
    /// scanned-ness would have come from, so a pointer this pool doesn't
    /// recognize is stale or foreign, not a condition worth aborting over.
    ///
    /// Linear in the number of entries; this core has no cross-pool address
    /// index, so the matrix dispatches to the right pool by size class
    /// first and this scan only ever searches within it.
    pub fn free(&mut self, ptr: *const u8) -> Result<(), Error> {
        self.locate_and_release(ptr);
        Ok(())
    }

    /// Like [`Pool::free`], but reports whether `ptr` actually belonged to
    /// this pool, for [`crate::matrix::PoolMatrix::free_anywhere`]'s scan
    /// across every pool in the matrix.
    pub(crate) fn try_free(&mut self, ptr: *const u8) -> bool {
        self.locate_and_release(ptr)
    }
}
