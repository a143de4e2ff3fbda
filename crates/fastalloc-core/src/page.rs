//! OS page mapper and the page/slot layout for a single size class.
//!
//! Thinly wraps the `sys_alloc` crate (a sibling workspace member, a
//! low-level system-allocator crate of its own) for the three primitive
//! operations the rest of the allocator core needs: map, unmap, and
//! in-place remap.

use std::ptr::NonNull;

use crate::error::Error;

/// The OS page size this allocator is built against. Verified at startup
/// (see [`assert_page_size`]) rather than trusted blindly, since a
/// size-class table computed against the wrong page size silently
/// corrupts every slot-address computation downstream.
pub const PAGE_SIZE: usize = 4096;

/// Panics if the runtime page size reported by the OS does not match
/// [`PAGE_SIZE`]. Every size-class constant in this crate assumes 4 KiB
/// pages; a mismatch is a fatal configuration error, not a recoverable one,
/// since it would silently corrupt slot-address arithmetic.
pub fn assert_page_size() {
    let actual = sys_alloc::page_size();
    assert_eq!(
        actual, PAGE_SIZE,
        "allocator core is built for a {PAGE_SIZE}-byte page, but the OS reports {actual}"
    );
}

/// Maps a fresh, zero-filled, page-aligned region of exactly `bytes` bytes.
///
/// `bytes` must already be a multiple of [`PAGE_SIZE`].
pub(crate) fn map_pages(bytes: usize) -> Result<NonNull<u8>, Error> {
    debug_assert_eq!(bytes % PAGE_SIZE, 0);
    // SAFETY: `bytes` is non-zero and a multiple of PAGE_SIZE by contract.
    let ptr = unsafe { sys_alloc::map_raw(bytes) }.map_err(|_| Error::OutOfMemory)?;
    NonNull::new(ptr).ok_or(Error::OutOfMemory)
}

/// Unmaps a region previously returned by [`map_pages`] or [`remap_pages`].
pub(crate) fn unmap_pages(ptr: NonNull<u8>, bytes: usize) {
    // SAFETY: caller guarantees `ptr`/`bytes` describe a live mapping it owns.
    unsafe { sys_alloc::unmap_raw(ptr.as_ptr(), bytes) }
}

/// Grows or shrinks a mapping in place where the platform offers `mremap`
/// (Linux), preserving contents and possibly relocating. Returns `None` when
/// unsupported; the caller falls back to map-new + copy + unmap-old.
pub(crate) fn remap_pages(ptr: NonNull<u8>, old_bytes: usize, new_bytes: usize) -> Option<NonNull<u8>> {
    // SAFETY: caller guarantees `ptr`/`old_bytes` describe a live mapping it owns.
    let result = unsafe { sys_alloc::remap_raw(ptr.as_ptr(), old_bytes, new_bytes) };
    result.and_then(NonNull::new)
}

/// Number of slots of size class `class` that fit in one OS page, or `1`
/// when `class` spans multiple pages (a medium class).
#[must_use]
pub const fn slots_per_page(class: usize) -> usize {
    if class <= PAGE_SIZE {
        PAGE_SIZE / class
    } else {
        1
    }
}

/// Number of OS pages a single slot of size class `class` occupies; `1` for
/// every small class and for medium classes up to one page.
#[must_use]
pub const fn pages_per_slot(class: usize) -> usize {
    if class <= PAGE_SIZE {
        1
    } else {
        class.div_ceil(PAGE_SIZE)
    }
}

/// Total bytes mapped for one page-table entry of size class `class`:
/// exactly one page for small classes, `pages_per_slot(class) * PAGE_SIZE`
/// for medium ones.
#[must_use]
pub const fn region_bytes(class: usize) -> usize {
    pages_per_slot(class) * PAGE_SIZE
}

/// One page (or, for a medium class, the run of pages backing a single
/// slot), owned and mapped for a single size class `S`.
///
/// This is the Rust rendering of the original's "page-sized struct
/// parameterized by size class": rather than a fixed-size array type (which
/// would require unstable const-generic array-length expressions to compute
/// `region_bytes(S)` on stable Rust), `Page<S>` holds a raw pointer to an
/// OS mapping of exactly that many bytes and exposes slot addressing.
pub struct Page<const S: usize> {
    ptr: NonNull<u8>,
}

impl<const S: usize> Page<S> {
    /// Compile-time check that `S` evenly divides (small class) or is an
    /// exact multiple of (medium class) [`PAGE_SIZE`] — the "whole page of
    /// slots" invariant. Referencing this associated const at every
    /// construction site forces the check to run at monomorphization time.
    const VALID_CLASS: () = assert!(
        S > 0
            && ((S <= PAGE_SIZE && PAGE_SIZE % S == 0) || (S > PAGE_SIZE && S % PAGE_SIZE == 0)),
        "size class must evenly divide, or be an exact multiple of, PAGE_SIZE"
    );

    /// Maps a new page (or page run) for size class `S`.
    pub fn map() -> Result<Self, Error> {
        let _ = Self::VALID_CLASS;
        let ptr = map_pages(region_bytes(S))?;
        Ok(Self { ptr })
    }

    /// Number of slots this page holds.
    #[must_use]
    pub const fn slot_count() -> usize {
        slots_per_page(S)
    }

    /// Base pointer of the mapped region.
    #[must_use]
    pub const fn base(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Address of slot `index` within this page.
    ///
    /// # Safety
    ///
    /// `index` must be `< Self::slot_count()`.
    #[must_use]
    pub unsafe fn slot_ptr(&self, index: usize) -> NonNull<u8> {
        debug_assert!(index < Self::slot_count());
        // SAFETY: offset stays within the mapped region by the precondition.
        unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(index * S)) }
    }
}

impl<const S: usize> Drop for Page<S> {
    fn drop(&mut self) {
        unmap_pages(self.ptr, region_bytes(S));
    }
}
