//! Concrete end-to-end scenarios, one test per scenario.

use fastalloc_core::bag::Bag;
use fastalloc_core::bitmap::StaticBitmap;
use fastalloc_core::matrix::PoolMatrix;
use fastalloc_core::paged_vec::PagedVec;

/// S1: a 1-byte `NO_SCAN` request lands in the unscanned 8-byte pool at
/// offset 0; a second identical request lands right after it.
#[test]
fn s1_sub_byte_unscanned_request_rounds_up_and_packs_slots_contiguously() {
    let mut matrix = PoolMatrix::empty();
    let b1 = matrix.qalloc(1, false, false).expect("alloc") as usize;
    assert_eq!(matrix.pool_8_noscan.entry_count(), 1);
    assert!(matrix.pool_8_noscan.entry(0).is_occupied(0));

    let b2 = matrix.qalloc(1, false, false).expect("alloc") as usize;
    assert_eq!(b2, b1 + 8);
    assert!(matrix.pool_8_noscan.entry(0).is_occupied(1));
}

/// S2: 256 consecutive 16-byte scanned allocations fit in one page
/// (`4096 / 16 == 256` slots); the 257th forces a second page.
#[test]
fn s2_filling_one_page_of_16_byte_slots_then_one_more_grows_a_second_page() {
    let mut matrix = PoolMatrix::empty();
    for _ in 0..256 {
        matrix.qalloc(16, true, false).expect("alloc");
    }
    assert_eq!(matrix.pool_16_scan.entry_count(), 1);

    matrix.qalloc(16, true, false).expect("alloc");
    assert_eq!(matrix.pool_16_scan.entry_count(), 2);
}

/// S3: a 5000-byte request fails with out-of-memory when medium classes are
/// disabled, since it exceeds the largest small class (2048); no pool grows.
#[test]
fn s3_oversized_request_without_medium_classes_fails_without_mapping_a_page() {
    let mut matrix = PoolMatrix::empty();
    let result = matrix.qalloc(5000, true, false);
    assert!(result.is_err());
    assert_eq!(matrix.pool_2048_scan.entry_count(), 0);
}

/// S4: a `PagedVec<u64>` holding 1000 sequential values round-trips by
/// index, reports the exact page-rounded capacity, and fully releases its
/// mapping when shrunk to zero.
#[test]
fn s4_paged_vec_of_u64_round_trips_and_releases_on_zero_length() {
    let mut v: PagedVec<u64> = PagedVec::new();
    for i in 0..1000u64 {
        v.push(i).expect("push");
    }
    for i in 0..1000usize {
        assert_eq!(v[i], i as u64);
    }
    let expected_capacity_bytes = (8000usize.div_ceil(4096)) * 4096;
    assert_eq!(v.capacity_in_bytes(), expected_capacity_bytes);

    v.set_length(0).expect("shrink to zero");
    assert_eq!(v.len(), 0);
    assert_eq!(v.capacity_in_bytes(), 0);
}

/// S5: a 127-bit bitmap reports `first_set_index() == 127` while empty;
/// setting bits 126, 63, then 0 (in that order) always reports the minimum
/// set index, and clearing walks the minimum back up correctly.
#[test]
fn s5_bitmap_first_set_index_tracks_the_minimum_through_sets_and_clears() {
    let mut bitmap = StaticBitmap::new(127);
    assert_eq!(bitmap.first_set_index(), 127);

    bitmap.set(126);
    bitmap.set(63);
    bitmap.set(0);
    assert_eq!(bitmap.first_set_index(), 0);

    bitmap.clear(0);
    assert_eq!(bitmap.first_set_index(), 63);
}

/// S6: adding two roots then removing the first leaves only the second
/// visible; removing the second empties the bag; removing the first again
/// panics, since `remove` on an absent value is a caller-contract violation.
#[test]
fn s6_root_bag_add_remove_and_absent_removal_panics() {
    let mut bag: Bag<usize> = Bag::new();
    let r1 = 0x1000;
    let r2 = 0x2000;

    bag.push(r1);
    bag.push(r2);
    bag.remove(&r1);
    assert!(bag.contains(&r2));
    assert!(!bag.contains(&r1));

    bag.remove(&r2);
    assert!(bag.is_empty());

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| bag.remove(&r1)));
    assert!(result.is_err(), "removing an absent root must panic");
}
