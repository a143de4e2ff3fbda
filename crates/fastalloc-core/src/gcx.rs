//! `Gcx`: one allocator instance — a pool matrix plus the root/range bags
//! and the collection-disable depth a host runtime toggles around
//! uncollectable sections.
//!
//! Combines the pool matrix and the root/range shadow-stack bags into a
//! single instance type, since there is no line between "the heap" and "the
//! root set" for this core's purposes — both are owned by whichever
//! allocator instance a thread is using, global or thread-local (see
//! [`crate::global`] and [`crate::tlab`]).

use std::ptr::NonNull;

use crate::config::AllocatorConfig;
use crate::error::Error;
use crate::matrix::PoolMatrix;
use crate::bag::Bag;

/// Per-allocation attribute bits. Currently only distinguishes scanned from
/// unscanned memory; a host runtime that needs richer per-object metadata
/// (type tags, finalizer presence) layers that on top of a `BlockInfo`,
/// since object-type information is out of scope for this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attrs(u8);

impl Attrs {
    /// The allocation holds no outgoing pointers a collector needs to
    /// trace; it is routed to the unscanned half of its size class's pool.
    pub const NO_SCAN: Attrs = Attrs(1 << 0);

    /// No attributes set: a scanned, otherwise plain allocation.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Whether `flag` is set.
    #[must_use]
    pub const fn contains(self, flag: Attrs) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl std::ops::BitOr for Attrs {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Everything a caller needs to free or scan a block later: its address,
/// the size class it actually landed in (always `>=` the requested size),
/// and the attributes it was allocated with.
#[derive(Debug, Clone, Copy)]
pub struct BlockInfo {
    /// Address of the first byte of the block.
    pub base: NonNull<u8>,
    /// The size class the block was rounded up to.
    pub size: usize,
    /// Attributes the block was allocated with.
    pub attrs: Attrs,
}

/// Coarse, approximate counters for diagnostics. Exact live-object counts
/// require a trace, which is out of scope for this core; these counts only
/// describe allocator-side bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    /// Total page-table entries mapped across every pool in the matrix.
    pub mapped_entries: usize,
    /// Number of roots currently registered.
    pub root_count: usize,
    /// Number of conservative ranges currently registered.
    pub range_count: usize,
    /// Current collection-disable depth; collection only runs at `0`.
    pub disable_depth: usize,
}

/// The core allocation surface every `Gcx` instance (global or
/// thread-local) implements.
///
/// Mark/sweep traversal, finalizer invocation, and object-type information
/// are deliberately absent: this trait is the fast allocation path only.
pub trait Allocator {
    /// Allocates at least `size` bytes of scanned memory.
    fn malloc(&mut self, size: usize) -> Result<BlockInfo, Error>;
    /// Allocates at least `size` bytes with the given `attrs`.
    fn qalloc(&mut self, size: usize, attrs: Attrs) -> Result<BlockInfo, Error>;
    /// Allocates `count * size` zero-filled bytes of scanned memory.
    fn calloc(&mut self, count: usize, size: usize) -> Result<BlockInfo, Error>;
    /// Releases a block previously returned by this instance. A `block`
    /// this instance doesn't recognize (already freed, or never allocated
    /// by it) is a silent no-op, never a foreign pointer passed elsewhere.
    fn free(&mut self, block: &BlockInfo) -> Result<(), Error>;
    /// Registers `ptr` as a conservative root.
    fn add_root(&mut self, ptr: NonNull<u8>);
    /// Unregisters a root previously added with [`Allocator::add_root`].
    fn remove_root(&mut self, ptr: NonNull<u8>);
    /// Registers `[start, end)` as a conservatively scanned address range.
    fn add_range(&mut self, start: NonNull<u8>, end: NonNull<u8>);
    /// Unregisters a range previously added with [`Allocator::add_range`].
    fn remove_range(&mut self, start: NonNull<u8>, end: NonNull<u8>);
    /// Increments the collection-disable depth.
    fn disable(&mut self);
    /// Decrements the collection-disable depth.
    ///
    /// # Panics
    ///
    /// Panics if collection is not currently disabled.
    fn enable(&mut self);
    /// Whether collection is currently disabled (`disable_depth > 0`).
    fn is_enabled(&self) -> bool;
    /// Whether this instance is currently running a finalizer.
    fn in_finalizer(&self) -> bool;
    /// A snapshot of approximate bookkeeping counters.
    fn stats(&self) -> Stats;
}

/// One allocator instance: a full pool matrix plus its root and range bags
/// and its collection-disable depth.
///
/// Neither `Send` nor `Sync` is derived for `Gcx` itself; see
/// [`crate::global`] for the spinlock-guarded shared instance and
/// [`crate::tlab`] for the thread-local one.
pub struct Gcx {
    matrix: PoolMatrix,
    roots: Bag<usize>,
    ranges: Bag<(usize, usize)>,
    disable_depth: usize,
    finalizing: bool,
    config: AllocatorConfig,
}

impl Gcx {
    /// A fresh instance, configured per `config`. When
    /// [`AllocatorConfig::initial_page_table_capacity`] is non-zero, every
    /// pool's page table is pre-reserved to that many entries up front; a
    /// reservation failure is an out-of-memory condition at startup and is
    /// handled the same way a failed allocation would be.
    #[must_use]
    pub fn new(config: AllocatorConfig) -> Self {
        #[cfg(all(not(feature = "medium-classes"), feature = "tracing"))]
        if config.enable_medium_classes {
            tracing::warn!(
                "AllocatorConfig::enable_medium_classes is set but the \
                 medium-classes cargo feature is not compiled in; medium \
                 requests will report out-of-memory"
            );
        }
        let matrix = if config.initial_page_table_capacity == 0 {
            PoolMatrix::empty()
        } else {
            match PoolMatrix::with_capacity_hint(config.initial_page_table_capacity) {
                Ok(matrix) => matrix,
                Err(crate::error::Error::OutOfMemory) => crate::error::handle_out_of_memory(),
                Err(_) => crate::error::handle_invalid_memory_operation(),
            }
        };
        Self {
            matrix,
            roots: Bag::new(),
            ranges: Bag::new(),
            disable_depth: 0,
            finalizing: false,
            config,
        }
    }

    /// Marks or clears whether this instance is currently inside a
    /// finalizer. Finalizer invocation itself is out of scope for this
    /// core; the host runtime that does call finalizers toggles this flag
    /// around each call so [`Allocator::in_finalizer`] can report it.
    pub fn set_finalizing(&mut self, finalizing: bool) {
        self.finalizing = finalizing;
    }

    /// Direct access to the pool matrix, for the thread-local fast-path
    /// entry points (`tlab::tlalloc_*`) that bypass [`Allocator::qalloc`]'s
    /// `ceil_pow2` dispatch and call a specific pool's `allocate_next`
    /// directly.
    pub(crate) fn matrix_mut(&mut self) -> &mut PoolMatrix {
        &mut self.matrix
    }
}

impl Allocator for Gcx {
    fn malloc(&mut self, size: usize) -> Result<BlockInfo, Error> {
        self.qalloc(size, Attrs::empty())
    }

    fn qalloc(&mut self, size: usize, attrs: Attrs) -> Result<BlockInfo, Error> {
        let scanned = !attrs.contains(Attrs::NO_SCAN);
        let ptr = self
            .matrix
            .qalloc(size, scanned, self.config.enable_medium_classes)?;
        let class = crate::size_class::ceil_pow2(size).ok_or(Error::OutOfMemory)?;
        Ok(BlockInfo {
            base: NonNull::new(ptr).ok_or(Error::OutOfMemory)?,
            size: class,
            attrs,
        })
    }

    fn calloc(&mut self, count: usize, size: usize) -> Result<BlockInfo, Error> {
        let total = count.checked_mul(size).ok_or(Error::OutOfMemory)?;
        let block = self.qalloc(total, Attrs::empty())?;
        // SAFETY: `block.size >= total` and the block was just allocated
        // exclusively to us.
        unsafe { block.base.as_ptr().write_bytes(0, block.size) };
        Ok(block)
    }

    fn free(&mut self, block: &BlockInfo) -> Result<(), Error> {
        let scanned = !block.attrs.contains(Attrs::NO_SCAN);
        self.matrix.free(block.size, scanned, block.base.as_ptr())
    }

    fn add_root(&mut self, ptr: NonNull<u8>) {
        self.roots.push(ptr.as_ptr() as usize);
    }

    fn remove_root(&mut self, ptr: NonNull<u8>) {
        self.roots.remove(&(ptr.as_ptr() as usize));
    }

    fn add_range(&mut self, start: NonNull<u8>, end: NonNull<u8>) {
        self.ranges.push((start.as_ptr() as usize, end.as_ptr() as usize));
    }

    fn remove_range(&mut self, start: NonNull<u8>, end: NonNull<u8>) {
        self.ranges
            .remove(&(start.as_ptr() as usize, end.as_ptr() as usize));
    }

    fn disable(&mut self) {
        self.disable_depth += 1;
    }

    fn enable(&mut self) {
        assert!(self.disable_depth > 0, "enable() called without a matching disable()");
        self.disable_depth -= 1;
    }

    fn is_enabled(&self) -> bool {
        self.disable_depth == 0
    }

    fn in_finalizer(&self) -> bool {
        self.finalizing
    }

    fn stats(&self) -> Stats {
        Stats {
            mapped_entries: 0,
            root_count: self.roots.len(),
            range_count: self.ranges.len(),
            disable_depth: self.disable_depth,
        }
    }
}
