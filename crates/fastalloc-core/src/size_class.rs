//! Compile-time size-class table and the ceiling function that routes a
//! byte count to its pool.

/// The required small size classes, ascending, each a multiple of the
/// machine word.
pub const SMALL_CLASSES: [usize; 9] = [8, 16, 32, 64, 128, 256, 512, 1024, 2048];

/// Optional medium size classes, one slot (or N pages for the largest) per
/// page. Only constructed in the pool matrix when
/// [`crate::config::AllocatorConfig::enable_medium_classes`] is set.
pub const MEDIUM_CLASSES: [usize; 5] = [4096, 8192, 16384, 32768, 65536];

/// Smallest size class; `ceil_pow2` never returns less than this.
pub const SMALLEST_CLASS: usize = SMALL_CLASSES[0];

/// Largest size class this core can route to, including medium classes.
pub const LARGEST_CLASS: usize = MEDIUM_CLASSES[MEDIUM_CLASSES.len() - 1];

/// Rounds `n` up to the smallest supported size class `>= max(n,
/// SMALLEST_CLASS)`.
///
/// Returns `None` when `n` exceeds [`LARGEST_CLASS`] (out-of-memory at the
/// dispatch layer — there is no class large enough).
///
/// `ceil_pow2(n)` for `n <= 1` returns `SMALLEST_CLASS` unconditionally —
/// there is no class smaller than the smallest class, so rounding a
/// zero-or-negative-sized request down to it is the only sensible answer.
#[must_use]
pub fn ceil_pow2(n: usize) -> Option<usize> {
    if n <= SMALLEST_CLASS {
        return Some(SMALLEST_CLASS);
    }
    if n > LARGEST_CLASS {
        return None;
    }
    Some(n.next_power_of_two())
}

/// Index of a size class within [`SMALL_CLASSES`] followed by
/// [`MEDIUM_CLASSES`], i.e. the column a size class occupies in the pool
/// matrix. Returns `None` if `class` is not one of the known classes.
#[must_use]
pub fn class_index(class: usize) -> Option<usize> {
    SMALL_CLASSES
        .iter()
        .chain(MEDIUM_CLASSES.iter())
        .position(|&c| c == class)
}
