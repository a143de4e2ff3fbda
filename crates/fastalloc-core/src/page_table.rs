//! A page-table entry: one mapped page plus its occupancy and mark state.
//!
//! A page header in this style typically bundles an inline
//! `allocated_bitmap`/`mark_bitmap` pair alongside a bump pointer and free
//! list. This rendering keeps the bitmap pairing but drops the bump
//! pointer and free list in favor of the cursor-plus-bitmap scheme the pool
//! module owns (see [`crate::pool`]), since the per-entry scan order is the
//! pool's concern, not the entry's.

use crate::bitmap::StaticBitmap;
use crate::error::Error;
use crate::page::{region_bytes, Page};

/// One page-table entry: a mapped page of size class `S`, its occupancy
/// bitmap (which slots hold a live object), and its mark bitmap (which live
/// slots survived the last trace).
///
/// Occupancy and mark state live here, not in the page itself, because a
/// collector needs to read mark bits across every entry in a pool without
/// touching the mapped page contents.
pub struct PageTableEntry<const S: usize> {
    page: Page<S>,
    occupied: StaticBitmap,
    marked: StaticBitmap,
}

impl<const S: usize> PageTableEntry<S> {
    /// Maps a fresh page and initializes both bitmaps to all-zero.
    pub fn new() -> Result<Self, Error> {
        let page = Page::<S>::map()?;
        let slots = Page::<S>::slot_count();
        Ok(Self {
            page,
            occupied: StaticBitmap::new(slots),
            marked: StaticBitmap::new(slots),
        })
    }

    /// Number of slots in this entry's page.
    #[must_use]
    pub const fn slot_count() -> usize {
        Page::<S>::slot_count()
    }

    /// Whether every slot in this entry currently holds a live object.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.occupied.first_zero_index() == self.occupied.len()
    }

    /// Whether no slot in this entry currently holds a live object.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupied.count_ones() == 0
    }

    /// Lowest-indexed free slot, or `None` if the entry is full.
    #[must_use]
    pub fn first_free_slot(&self) -> Option<usize> {
        let idx = self.occupied.first_zero_index();
        (idx < self.occupied.len()).then_some(idx)
    }

    /// Marks `slot` occupied and returns its address.
    ///
    /// # Safety
    ///
    /// `slot` must be `< Self::slot_count()` and currently unoccupied.
    pub unsafe fn claim_slot(&mut self, slot: usize) -> *mut u8 {
        debug_assert!(!self.occupied.get(slot), "slot {slot} already occupied");
        self.occupied.set(slot);
        // SAFETY: `slot` is in range by the precondition.
        unsafe { self.page.slot_ptr(slot).as_ptr() }
    }

    /// Marks `slot` free again.
    pub fn release_slot(&mut self, slot: usize) {
        self.occupied.clear(slot);
        self.marked.clear(slot);
    }

    /// Whether `slot` currently holds a live object.
    #[must_use]
    pub fn is_occupied(&self, slot: usize) -> bool {
        self.occupied.get(slot)
    }

    /// Address of `slot`, regardless of occupancy.
    ///
    /// # Safety
    ///
    /// `slot` must be `< Self::slot_count()`.
    #[must_use]
    pub unsafe fn slot_ptr(&self, slot: usize) -> *mut u8 {
        // SAFETY: forwarded precondition.
        unsafe { self.page.slot_ptr(slot).as_ptr() }
    }

    /// Sets the mark bit for `slot`.
    pub fn mark(&mut self, slot: usize) {
        self.marked.set(slot);
    }

    /// Whether `slot` is marked.
    #[must_use]
    pub fn is_marked(&self, slot: usize) -> bool {
        self.marked.get(slot)
    }

    /// Clears every mark bit, ready for the next trace.
    pub fn clear_marks(&mut self) {
        self.marked.reset();
    }

    /// The slot index owning `ptr`, if `ptr` falls within this entry's page.
    #[must_use]
    pub fn slot_of(&self, ptr: *const u8) -> Option<usize> {
        let base = self.page.base().as_ptr() as usize;
        let addr = ptr as usize;
        if addr < base || addr >= base + region_bytes(S) {
            return None;
        }
        Some((addr - base) / S)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_empty_and_has_free_slots() {
        let entry = PageTableEntry::<64>::new().expect("map");
        assert!(entry.is_empty());
        assert!(!entry.is_full());
        assert_eq!(entry.first_free_slot(), Some(0));
    }

    #[test]
    fn claim_and_release_round_trips_occupancy() {
        let mut entry = PageTableEntry::<64>::new().expect("map");
        // SAFETY: slot 0 is free in a fresh entry.
        let ptr = unsafe { entry.claim_slot(0) };
        assert!(!ptr.is_null());
        assert!(entry.is_occupied(0));
        assert_eq!(entry.first_free_slot(), Some(1));
        entry.release_slot(0);
        assert!(!entry.is_occupied(0));
        assert_eq!(entry.first_free_slot(), Some(0));
    }

    #[test]
    fn filling_every_slot_reports_full() {
        let mut entry = PageTableEntry::<2048>::new().expect("map");
        let slots = PageTableEntry::<2048>::slot_count();
        for i in 0..slots {
            // SAFETY: slot `i` is free; loop never revisits a slot.
            unsafe { entry.claim_slot(i) };
        }
        assert!(entry.is_full());
        assert_eq!(entry.first_free_slot(), None);
    }

    #[test]
    fn slot_of_locates_pointers_within_the_page_only() {
        let mut entry = PageTableEntry::<64>::new().expect("map");
        // SAFETY: slot 2 is free.
        let ptr = unsafe { entry.claim_slot(2) };
        assert_eq!(entry.slot_of(ptr), Some(2));
        let outside = (ptr as usize + 1_000_000) as *const u8;
        assert_eq!(entry.slot_of(outside), None);
    }

    #[test]
    fn marks_are_independent_of_occupancy() {
        let mut entry = PageTableEntry::<64>::new().expect("map");
        // SAFETY: slot 3 is free.
        unsafe { entry.claim_slot(3) };
        entry.mark(3);
        assert!(entry.is_marked(3));
        entry.clear_marks();
        assert!(!entry.is_marked(3));
        assert!(entry.is_occupied(3));
    }
}
