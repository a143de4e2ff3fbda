//! The process-wide allocator instance, guarded by a [`SpinLock`].
//!
//! Follows the common module-level `static` pattern for process-wide GC
//! state, guarding a [`Gcx`] instead of a full tracing collector.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::AllocatorConfig;
use crate::error::{self, Error};
use crate::gcx::{Allocator, BlockInfo, Gcx, Stats};
use crate::sync::SpinLock;

static GLOBAL: SpinLock<Option<Gcx>> = SpinLock::new(None);
static FINALIZER_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Acquires [`GLOBAL`] and runs `f` against it. Every public entry point on
/// [`GlobalAllocator`] (and [`configure`]) funnels through this one function,
/// so the finalizer-reentrancy guard below covers every acquisition of the
/// lock, not just the allocating methods: §5 requires that *any* attempt to
/// acquire the global lock while a finalizer is active is an invalid memory
/// operation, not merely an allocation made from one.
fn with_global<R>(f: impl FnOnce(&mut Gcx) -> R) -> R {
    if FINALIZER_ACTIVE.load(Ordering::SeqCst) {
        #[cfg(feature = "tracing")]
        tracing::error!("blocked a global-lock acquisition attempted from inside a finalizer");
        error::handle_invalid_memory_operation();
    }
    let mut guard = GLOBAL.lock();
    let gcx = guard.get_or_insert_with(|| Gcx::new(AllocatorConfig::default()));
    f(gcx)
}

/// Replaces the global instance's configuration, discarding any existing
/// pools. Intended for startup only; calling this after allocations have
/// already happened leaks every previously mapped page, since `Gcx` does
/// not track which process-level mappings it owns separately from its pool
/// matrix.
pub fn configure(config: AllocatorConfig) {
    with_global(|gcx| *gcx = Gcx::new(config));
}

/// Marks the current call as running inside a finalizer, or clears that
/// marking. Any acquisition of the global lock made while already marked is
/// the one memory operation this core refuses outright: finalizers are
/// host-runtime code with no bound on what they might do, and reentering the
/// global lock from inside one (rather than deadlocking, since this is a
/// spinlock) would corrupt pool state.
pub fn set_finalizer_active(active: bool) {
    FINALIZER_ACTIVE.store(active, Ordering::SeqCst);
}

/// The spinlock-guarded, process-wide [`Allocator`].
///
/// Every method here acquires [`GLOBAL`] for the duration of the call only;
/// there is no way to hold the lock across two calls, which rules out the
/// classic "allocate while holding a root-set iterator" deadlock by
/// construction.
pub struct GlobalAllocator;

impl Allocator for GlobalAllocator {
    fn malloc(&mut self, size: usize) -> Result<BlockInfo, Error> {
        match with_global(|gcx| gcx.malloc(size)) {
            Err(Error::OutOfMemory) => error::handle_out_of_memory(),
            result => result,
        }
    }

    fn qalloc(&mut self, size: usize, attrs: crate::gcx::Attrs) -> Result<BlockInfo, Error> {
        match with_global(|gcx| gcx.qalloc(size, attrs)) {
            Err(Error::OutOfMemory) => error::handle_out_of_memory(),
            result => result,
        }
    }

    fn calloc(&mut self, count: usize, size: usize) -> Result<BlockInfo, Error> {
        match with_global(|gcx| gcx.calloc(count, size)) {
            Err(Error::OutOfMemory) => error::handle_out_of_memory(),
            result => result,
        }
    }

    fn free(&mut self, block: &BlockInfo) -> Result<(), Error> {
        with_global(|gcx| gcx.free(block))
    }

    fn add_root(&mut self, ptr: NonNull<u8>) {
        with_global(|gcx| gcx.add_root(ptr));
    }

    fn remove_root(&mut self, ptr: NonNull<u8>) {
        with_global(|gcx| gcx.remove_root(ptr));
    }

    fn add_range(&mut self, start: NonNull<u8>, end: NonNull<u8>) {
        with_global(|gcx| gcx.add_range(start, end));
    }

    fn remove_range(&mut self, start: NonNull<u8>, end: NonNull<u8>) {
        with_global(|gcx| gcx.remove_range(start, end));
    }

    fn disable(&mut self) {
        with_global(|gcx| gcx.disable());
    }

    fn enable(&mut self) {
        with_global(|gcx| gcx.enable());
    }

    fn is_enabled(&self) -> bool {
        with_global(|gcx| gcx.is_enabled())
    }

    fn in_finalizer(&self) -> bool {
        FINALIZER_ACTIVE.load(Ordering::SeqCst)
    }

    fn stats(&self) -> Stats {
        with_global(|gcx| gcx.stats())
    }
}
