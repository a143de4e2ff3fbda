//! The pool matrix: one [`Pool`] per `(size class, scanned)` pair, and the
//! dispatch that routes a requested size to the right one.
//!
//! Follows the classic BiBOP pattern of one `segment_16`..`segment_2048`
//! field per size class held directly on the heap struct rather than behind
//! a further indirection. `generate_pool_matrix!` below is this crate's
//! version of that: a macro that expands to one pair
//! of named fields (scanned / unscanned) per size class plus the
//! const-generic-indexed `match` that picks between them, so adding a size
//! class is a one-line change to the macro invocation rather than a
//! hand-maintained struct and match arm.

use crate::error::Error;
use crate::pool::Pool;
use crate::size_class::{ceil_pow2, SMALL_CLASSES};

macro_rules! generate_pool_matrix {
    ( small: { $( $small_scan:ident, $small_noscan:ident => $small_size:expr ),+ $(,)? }
      medium: { $( $med_scan:ident, $med_noscan:ident => $med_size:expr ),+ $(,)? } ) => {
        /// One [`Pool`] per size class, split into a scanned and an
        /// unscanned half.
        ///
        /// Field names follow `pool_<class>_{scan,noscan}`; see the
        /// `generate_pool_matrix!` invocation below for the full list.
        #[allow(missing_docs)]
        pub struct PoolMatrix {
            $( pub $small_scan: Pool<$small_size>, pub $small_noscan: Pool<$small_size>, )+
            $(
                #[cfg(feature = "medium-classes")]
                pub $med_scan: Pool<$med_size>,
                #[cfg(feature = "medium-classes")]
                pub $med_noscan: Pool<$med_size>,
            )+
        }

        impl PoolMatrix {
            fn new() -> Self {
                Self {
                    $( $small_scan: Pool::new(true), $small_noscan: Pool::new(false), )+
                    $(
                        #[cfg(feature = "medium-classes")]
                        $med_scan: Pool::new(true),
                        #[cfg(feature = "medium-classes")]
                        $med_noscan: Pool::new(false),
                    )+
                }
            }

            pub(crate) fn with_capacity_hint(hint: usize) -> Result<Self, Error> {
                Ok(Self {
                    $(
                        $small_scan: Pool::with_capacity_hint(true, hint)?,
                        $small_noscan: Pool::with_capacity_hint(false, hint)?,
                    )+
                    $(
                        #[cfg(feature = "medium-classes")]
                        $med_scan: Pool::with_capacity_hint(true, hint)?,
                        #[cfg(feature = "medium-classes")]
                        $med_noscan: Pool::with_capacity_hint(false, hint)?,
                    )+
                })
            }

            fn dispatch(&mut self, class: usize, scanned: bool) -> Option<Result<*mut u8, Error>> {
                match (class, scanned) {
                    $(
                        ($small_size, true) => Some(self.$small_scan.allocate_next()),
                        ($small_size, false) => Some(self.$small_noscan.allocate_next()),
                    )+
                    $(
                        #[cfg(feature = "medium-classes")]
                        ($med_size, true) => Some(self.$med_scan.allocate_next()),
                        #[cfg(feature = "medium-classes")]
                        ($med_size, false) => Some(self.$med_noscan.allocate_next()),
                    )+
                    _ => None,
                }
            }

            fn free_in_class(&mut self, class: usize, scanned: bool, ptr: *const u8) -> Option<Result<(), Error>> {
                match (class, scanned) {
                    $(
                        ($small_size, true) => Some(self.$small_scan.free(ptr)),
                        ($small_size, false) => Some(self.$small_noscan.free(ptr)),
                    )+
                    $(
                        #[cfg(feature = "medium-classes")]
                        ($med_size, true) => Some(self.$med_scan.free(ptr)),
                        #[cfg(feature = "medium-classes")]
                        ($med_size, false) => Some(self.$med_noscan.free(ptr)),
                    )+
                    _ => None,
                }
            }

            /// Tries to free `ptr` from whichever pool it was allocated out
            /// of, searching every `(class, scanned)` pool in turn.
            ///
            /// Unlike [`Self::free`] (which already knows the size class and
            /// so treats an unrecognized pointer as a silent no-op per
            /// [`crate::pool::Pool::free`]'s contract), this has no class to
            /// trust and reports [`Error::InvalidMemoryOperation`] if `ptr`
            /// doesn't belong to any pool in the matrix. A real `Gcx::free`
            /// caller that already knows the size class should call
            /// [`Self::free_in_class`] directly instead of paying for this
            /// full sweep.
            pub fn free_anywhere(&mut self, ptr: *const u8) -> Result<(), Error> {
                $(
                    if self.$small_scan.try_free(ptr) { return Ok(()); }
                    if self.$small_noscan.try_free(ptr) { return Ok(()); }
                )+
                $(
                    #[cfg(feature = "medium-classes")]
                    if self.$med_scan.try_free(ptr) { return Ok(()); }
                    #[cfg(feature = "medium-classes")]
                    if self.$med_noscan.try_free(ptr) { return Ok(()); }
                )+
                Err(Error::InvalidMemoryOperation)
            }
        }
    };
}

generate_pool_matrix! {
    small: {
        pool_8_scan, pool_8_noscan => 8,
        pool_16_scan, pool_16_noscan => 16,
        pool_32_scan, pool_32_noscan => 32,
        pool_64_scan, pool_64_noscan => 64,
        pool_128_scan, pool_128_noscan => 128,
        pool_256_scan, pool_256_noscan => 256,
        pool_512_scan, pool_512_noscan => 512,
        pool_1024_scan, pool_1024_noscan => 1024,
        pool_2048_scan, pool_2048_noscan => 2048,
    }
    medium: {
        pool_4096_scan, pool_4096_noscan => 4096,
        pool_8192_scan, pool_8192_noscan => 8192,
        pool_16384_scan, pool_16384_noscan => 16384,
        pool_32768_scan, pool_32768_noscan => 32768,
        pool_65536_scan, pool_65536_noscan => 65536,
    }
}

impl PoolMatrix {
    /// A fresh matrix with every pool empty (no pages mapped yet).
    #[must_use]
    pub fn empty() -> Self {
        Self::new()
    }

    /// Routes a `size`-byte, `scanned` request to its size class's pool and
    /// allocates a slot.
    ///
    /// `enable_medium` gates whether a request that rounds into a medium
    /// class is served at all; with the `medium-classes` feature compiled
    /// out, the medium pools don't exist in [`PoolMatrix`] and `dispatch`
    /// returns `None` regardless of this argument, so the request still
    /// reports out-of-memory even when the caller passes `true`. Both the
    /// feature and this flag are required for a medium request to succeed.
    pub fn qalloc(&mut self, size: usize, scanned: bool, enable_medium: bool) -> Result<*mut u8, Error> {
        let class = ceil_pow2(size).ok_or(Error::OutOfMemory)?;
        if class > *SMALL_CLASSES.last().expect("non-empty") && !enable_medium {
            return Err(Error::OutOfMemory);
        }
        self.dispatch(class, scanned).unwrap_or(Err(Error::OutOfMemory))
    }

    /// Frees `ptr`, already known to have been allocated at `size`/`scanned`.
    pub fn free(&mut self, size: usize, scanned: bool, ptr: *const u8) -> Result<(), Error> {
        let class = ceil_pow2(size).ok_or(Error::InvalidMemoryOperation)?;
        self.free_in_class(class, scanned, ptr)
            .unwrap_or(Err(Error::InvalidMemoryOperation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qalloc_routes_to_the_matching_size_class_pool() {
        let mut matrix = PoolMatrix::empty();
        let ptr = matrix.qalloc(20, false, false).expect("alloc");
        assert!(!ptr.is_null());
        assert_eq!(matrix.pool_32_noscan.entry_count(), 1);
        assert_eq!(matrix.pool_32_scan.entry_count(), 0);
    }

    #[test]
    fn qalloc_above_small_classes_without_medium_is_out_of_memory() {
        let mut matrix = PoolMatrix::empty();
        assert_eq!(matrix.qalloc(3000, false, false), Err(Error::OutOfMemory));
    }

    #[test]
    fn free_round_trips_through_the_matching_pool() {
        let mut matrix = PoolMatrix::empty();
        let ptr = matrix.qalloc(64, true, false).expect("alloc");
        matrix.free(64, true, ptr).expect("free");
        assert_eq!(matrix.free_anywhere(ptr), Err(Error::InvalidMemoryOperation));
    }

    #[test]
    fn free_of_a_class_with_no_mapped_pages_is_a_silent_no_op() {
        let mut matrix = PoolMatrix::empty();
        let bogus = 0xdead_beef_usize as *const u8;
        assert_eq!(matrix.free(64, true, bogus), Ok(()));
    }

    #[test]
    fn scanned_and_unscanned_requests_land_in_distinct_pools() {
        let mut matrix = PoolMatrix::empty();
        matrix.qalloc(128, true, false).expect("alloc");
        matrix.qalloc(128, false, false).expect("alloc");
        assert_eq!(matrix.pool_128_scan.entry_count(), 1);
        assert_eq!(matrix.pool_128_noscan.entry_count(), 1);
    }

    #[test]
    fn capacity_hint_preallocates_every_pool_in_the_matrix() {
        let matrix = PoolMatrix::with_capacity_hint(4).expect("reserve");
        assert!(matrix.pool_8_scan.entries_capacity() >= 4);
        assert!(matrix.pool_8_noscan.entries_capacity() >= 4);
        assert!(matrix.pool_2048_scan.entries_capacity() >= 4);
    }
}
