//! Size-class dispatch correctness across the whole pool matrix: a request
//! for `n` bytes always lands in the smallest size class `>= max(n,
//! smallest_class)`, in the pool matching its `scanned` flag, and nowhere
//! else.

use fastalloc_core::matrix::PoolMatrix;

#[test]
fn requests_round_up_to_the_smallest_covering_class() {
    let mut matrix = PoolMatrix::empty();

    matrix.qalloc(1, true, false).expect("alloc");
    assert_eq!(matrix.pool_8_scan.entry_count(), 1);

    matrix.qalloc(9, false, false).expect("alloc");
    assert_eq!(matrix.pool_16_noscan.entry_count(), 1);

    matrix.qalloc(2048, true, false).expect("alloc");
    assert_eq!(matrix.pool_2048_scan.entry_count(), 1);
}

#[test]
fn scanned_and_unscanned_requests_never_cross_pools() {
    let mut matrix = PoolMatrix::empty();
    for _ in 0..10 {
        matrix.qalloc(512, true, false).expect("alloc");
    }
    for _ in 0..3 {
        matrix.qalloc(512, false, false).expect("alloc");
    }
    assert_eq!(matrix.pool_512_scan.entry_count().min(1), 1);
    assert!(matrix.pool_512_noscan.entry_count() >= 1);
    // Unrelated classes are untouched by either series of requests above.
    assert_eq!(matrix.pool_256_scan.entry_count(), 0);
    assert_eq!(matrix.pool_1024_noscan.entry_count(), 0);
}

#[test]
fn a_request_above_the_largest_small_class_fails_without_medium_enabled() {
    let mut matrix = PoolMatrix::empty();
    assert!(matrix.qalloc(2049, true, false).is_err());
    assert!(matrix.qalloc(65536, false, false).is_err());
}

#[test]
fn freeing_through_the_matching_class_releases_the_right_pool_slot() {
    let mut matrix = PoolMatrix::empty();
    let ptr = matrix.qalloc(64, true, false).expect("alloc");
    assert_eq!(matrix.pool_64_scan.entry_count(), 1);
    matrix.free(64, true, ptr).expect("free");
    // A second free of the same, now-unowned pointer is a no-op, not an error.
    matrix.free(64, true, ptr).expect("second free is a no-op");
}

#[test]
fn free_anywhere_locates_a_pointer_without_knowing_its_class() {
    let mut matrix = PoolMatrix::empty();
    let ptr = matrix.qalloc(1024, false, false).expect("alloc");
    matrix.free_anywhere(ptr).expect("located and freed");
    assert!(matrix.free_anywhere(ptr).is_err(), "already freed, no pool owns it anymore");
}
