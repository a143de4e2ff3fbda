//! The thread-local, lock-free allocator instance and its specialized
//! per-size-class fast-path entry points.
//!
//! Follows the usual thread-local shadow-stack pattern (`thread_local!`
//! usage and the `!Send`/`!Sync`-by-construction pattern that follows from
//! living behind a thread-local cell), combined with a `Gcx` of its own
//! rather than sharing the global spinlock-guarded one: a thread-local
//! instance never contends, so it skips the lock entirely and the
//! `tlalloc_*` functions below go straight to the owning `Pool`.

use std::cell::RefCell;
use std::ptr::NonNull;

use crate::config::AllocatorConfig;
use crate::error::Error;
use crate::gcx::{Allocator, Attrs, BlockInfo, Gcx, Stats};

thread_local! {
    static TLAB: RefCell<Gcx> = RefCell::new(Gcx::new(AllocatorConfig::default()));
}

/// Reconfigures the calling thread's allocator instance, discarding its
/// existing pools. Like [`crate::global::configure`], intended for startup.
pub fn configure(config: AllocatorConfig) {
    TLAB.with(|cell| *cell.borrow_mut() = Gcx::new(config));
}

/// The thread-local [`Allocator`]. Every instance of this type on a given
/// thread shares the same underlying `Gcx` (the `thread_local!` cell), so
/// constructing more than one is harmless but pointless.
pub struct ThreadLocalAllocator;

impl Allocator for ThreadLocalAllocator {
    fn malloc(&mut self, size: usize) -> Result<BlockInfo, Error> {
        TLAB.with(|cell| cell.borrow_mut().malloc(size))
    }

    fn qalloc(&mut self, size: usize, attrs: Attrs) -> Result<BlockInfo, Error> {
        TLAB.with(|cell| cell.borrow_mut().qalloc(size, attrs))
    }

    fn calloc(&mut self, count: usize, size: usize) -> Result<BlockInfo, Error> {
        TLAB.with(|cell| cell.borrow_mut().calloc(count, size))
    }

    fn free(&mut self, block: &BlockInfo) -> Result<(), Error> {
        TLAB.with(|cell| cell.borrow_mut().free(block))
    }

    fn add_root(&mut self, ptr: NonNull<u8>) {
        TLAB.with(|cell| cell.borrow_mut().add_root(ptr));
    }

    fn remove_root(&mut self, ptr: NonNull<u8>) {
        TLAB.with(|cell| cell.borrow_mut().remove_root(ptr));
    }

    fn add_range(&mut self, start: NonNull<u8>, end: NonNull<u8>) {
        TLAB.with(|cell| cell.borrow_mut().add_range(start, end));
    }

    fn remove_range(&mut self, start: NonNull<u8>, end: NonNull<u8>) {
        TLAB.with(|cell| cell.borrow_mut().remove_range(start, end));
    }

    fn disable(&mut self) {
        TLAB.with(|cell| cell.borrow_mut().disable());
    }

    fn enable(&mut self) {
        TLAB.with(|cell| cell.borrow_mut().enable());
    }

    fn is_enabled(&self) -> bool {
        TLAB.with(|cell| cell.borrow().is_enabled())
    }

    fn in_finalizer(&self) -> bool {
        TLAB.with(|cell| cell.borrow().in_finalizer())
    }

    fn stats(&self) -> Stats {
        TLAB.with(|cell| cell.borrow().stats())
    }
}

macro_rules! generate_tlalloc_fns {
    ($( $name:ident => ($field:ident, $size:expr) ),+ $(,)?) => {
        $(
            /// Specialized fast-path entry point for a fixed, scanned size
            /// class. Goes straight to this pool's `allocate_next`,
            /// bypassing `ceil_pow2` and the `(class, scanned)` dispatch
            /// switch [`ThreadLocalAllocator::malloc`] pays on every call —
            /// the source of this core's fast-path speedup over the locked
            /// generic path.
            pub fn $name() -> Result<BlockInfo, Error> {
                TLAB.with(|cell| {
                    let mut gcx = cell.borrow_mut();
                    let ptr = gcx.matrix_mut().$field.allocate_next()?;
                    Ok(BlockInfo {
                        base: NonNull::new(ptr).ok_or(Error::OutOfMemory)?,
                        size: $size,
                        attrs: Attrs::empty(),
                    })
                })
            }
        )+
    };
}

generate_tlalloc_fns! {
    tlalloc_8 => (pool_8_scan, 8),
    tlalloc_16 => (pool_16_scan, 16),
    tlalloc_32 => (pool_32_scan, 32),
    tlalloc_64 => (pool_64_scan, 64),
    tlalloc_128 => (pool_128_scan, 128),
    tlalloc_256 => (pool_256_scan, 256),
    tlalloc_512 => (pool_512_scan, 512),
    tlalloc_1024 => (pool_1024_scan, 1024),
    tlalloc_2048 => (pool_2048_scan, 2048),
}

#[cfg(feature = "medium-classes")]
generate_tlalloc_fns! {
    tlalloc_4096 => (pool_4096_scan, 4096),
    tlalloc_8192 => (pool_8192_scan, 8192),
    tlalloc_16384 => (pool_16384_scan, 16384),
    tlalloc_32768 => (pool_32768_scan, 32768),
    tlalloc_65536 => (pool_65536_scan, 65536),
}
