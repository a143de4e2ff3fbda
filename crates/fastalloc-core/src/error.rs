//! Fatal error taxonomy for the allocator core.
//!
//! Nothing in this crate retries a failed operation and out-of-memory never
//! triggers a collection from within the core — that decision belongs to the
//! collector that sits on top of this allocator. Entry points that detect a
//! fatal condition return [`Error`] to their immediate caller, who decides
//! whether to invoke the matching host handler (see [`set_oom_handler`] and
//! [`set_invalid_op_handler`]) or propagate further.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fatal conditions this allocator core can encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Page mapping failed, a size/offset computation overflowed, or a
    /// request exceeded the largest supported size class.
    OutOfMemory,
    /// A lock acquisition was attempted on the global instance while a
    /// finalizer was running on the same thread.
    InvalidMemoryOperation,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "allocator core: out of memory"),
            Self::InvalidMemoryOperation => {
                write!(f, "allocator core: invalid memory operation (finalizer reentrancy)")
            }
        }
    }
}

impl std::error::Error for Error {}

type Handler = fn() -> !;

fn abort_handler() -> ! {
    std::process::abort()
}

// Handlers are stored as `usize` so they can live in a plain `AtomicUsize`;
// function pointers are never null, so 0 is an unambiguous sentinel that
// can't occur naturally, but we still seed the default at construction.
static OOM_HANDLER: AtomicUsize = AtomicUsize::new(abort_handler as usize);
static INVALID_OP_HANDLER: AtomicUsize = AtomicUsize::new(abort_handler as usize);

/// Installs the function invoked when an out-of-memory condition reaches a
/// top-level entry point (`malloc`/`qalloc`/`calloc`).
///
/// Defaults to [`std::process::abort`]. A host runtime with a richer
/// diagnostic path (e.g. unwinding into a language-level `OutOfMemoryError`)
/// can install its own handler here.
pub fn set_oom_handler(handler: Handler) {
    OOM_HANDLER.store(handler as usize, Ordering::SeqCst);
}

/// Installs the function invoked on an invalid memory operation (finalizer
/// reentrancy on the global lock). Defaults to [`std::process::abort`].
pub fn set_invalid_op_handler(handler: Handler) {
    INVALID_OP_HANDLER.store(handler as usize, Ordering::SeqCst);
}

/// Invokes the currently-installed out-of-memory handler. Never returns.
pub fn handle_out_of_memory() -> ! {
    let ptr = OOM_HANDLER.load(Ordering::SeqCst);
    // SAFETY: only ever stored from a `Handler` value by `set_oom_handler`.
    let handler: Handler = unsafe { std::mem::transmute::<usize, Handler>(ptr) };
    handler()
}

/// Invokes the currently-installed invalid-memory-operation handler. Never
/// returns.
pub fn handle_invalid_memory_operation() -> ! {
    let ptr = INVALID_OP_HANDLER.load(Ordering::SeqCst);
    // SAFETY: only ever stored from a `Handler` value by `set_invalid_op_handler`.
    let handler: Handler = unsafe { std::mem::transmute::<usize, Handler>(ptr) };
    handler()
}
