//! Segregated-fits, page-backed slab allocator core for a tracing
//! garbage collector's fast path.
//!
//! This crate implements the BiBOP ("big bag of pages") memory layer a
//! collector's `malloc`/`qalloc`/`free` bottom out in: OS page mapping, a
//! size-class table, per-page occupancy and mark bitmaps, and two parallel
//! allocator instances — a spinlock-guarded global one and a lock-free
//! thread-local one.
//!
//! Explicitly out of scope, and left to the collector layered on top:
//! mark/sweep traversal, finalizer invocation, object-type information, and
//! the public `Gc<T>` handle surface. This crate only gets memory in and
//! out of pools; deciding what is live is somebody else's problem.
#![warn(missing_docs)]
#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Root/range multiset used for both the root and range bags.
pub mod bag;
/// Fixed-length bit vectors for page occupancy and mark state.
pub mod bitmap;
/// Host-supplied tuning knobs.
pub mod config;
/// The fatal error taxonomy and handler-hook machinery.
pub mod error;
/// `Gcx`: one allocator instance (pool matrix, roots, ranges, disable depth).
pub mod gcx;
/// The spinlock-guarded, process-wide allocator instance.
pub mod global;
/// The `(size class, scanned)` pool matrix and its allocation dispatch.
pub mod matrix;
/// OS page mapping and the per-size-class page/slot type.
pub mod page;
/// Page-table entries: a mapped page plus its occupancy and mark bitmaps.
pub mod page_table;
/// A page-granular growable container, `mremap`-friendly.
pub mod paged_vec;
/// A pool of page-table entries for one `(size class, scanned)` pair.
pub mod pool;
/// The size-class table and the ceiling function that routes into it.
pub mod size_class;
/// A spinlock built for brief, contended critical sections.
pub mod sync;
/// The thread-local, lock-free allocator instance.
pub mod tlab;

pub use config::AllocatorConfig;
pub use error::Error;
pub use gcx::{Allocator, Attrs, BlockInfo, Gcx, Stats};
pub use global::GlobalAllocator;
pub use tlab::ThreadLocalAllocator;
