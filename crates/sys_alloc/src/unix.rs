use std::io::{self, Error};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(any(target_os = "linux", target_os = "android"))]
const MAP_POPULATE: libc::c_int = libc::MAP_POPULATE;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const MAP_POPULATE: libc::c_int = 0;

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_vendor = "apple",
    target_os = "netbsd",
    target_os = "solaris",
    target_os = "illumos",
))]
const MAP_NORESERVE: libc::c_int = libc::MAP_NORESERVE;

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_vendor = "apple",
    target_os = "netbsd",
    target_os = "solaris",
    target_os = "illumos",
)))]
const MAP_NORESERVE: libc::c_int = 0;

/// Returns the system page size, cached atomically.
pub fn page_size() -> usize {
    static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

    match PAGE_SIZE.load(Ordering::Relaxed) {
        0 => {
            let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize };
            PAGE_SIZE.store(page_size, Ordering::Relaxed);
            page_size
        }
        page_size => page_size,
    }
}

pub struct MmapInner {
    ptr: *mut libc::c_void,
    len: usize,
}

impl MmapInner {
    /// Creates a new anonymous memory mapping with an optional address hint.
    /// 
    /// # Safety
    /// 
    /// This function is unsafe because it calls `mmap`.
    pub unsafe fn map_anon(
        hint_addr: usize,
        len: usize,
        populate: bool,
        no_reserve: bool,
    ) -> io::Result<MmapInner> {
        let populate = if populate { MAP_POPULATE } else { 0 };
        let no_reserve = if no_reserve { MAP_NORESERVE } else { 0 };
        
        let addr = if hint_addr == 0 {
            ptr::null_mut()
        } else {
            hint_addr as *mut libc::c_void
        };

        // Standard flags for anonymous mapping
        let flags = libc::MAP_PRIVATE | libc::MAP_ANON | populate | no_reserve;
        let prot = libc::PROT_READ | libc::PROT_WRITE;

        let ptr = unsafe {
            libc::mmap(
                addr,
                len,
                prot,
                flags,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(Error::last_os_error());
        }

        // Basic verification: if we gave a hint, did we get it?
        // Note: we don't enforce strictness here (returning error if mismatch), 
        // that is up to the higher level policy. 
        // But for Address Space Coloring, the caller needs to check `ptr`.

        Ok(MmapInner { ptr, len })
    }

    pub fn ptr(&self) -> *mut u8 {
        self.ptr as *mut u8
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl Drop for MmapInner {
    fn drop(&mut self) {
        if self.len > 0 {
            unsafe {
                libc::munmap(self.ptr, self.len);
            }
        }
    }
}

unsafe impl Send for MmapInner {}
unsafe impl Sync for MmapInner {}

/// Maps a fresh anonymous, zero-filled region of `len` bytes.
///
/// # Safety
///
/// Calls `mmap`; the caller owns the returned pointer and must eventually
/// pass it to [`unmap_raw`].
pub unsafe fn map_raw(len: usize) -> io::Result<*mut u8> {
    let flags = libc::MAP_PRIVATE | libc::MAP_ANON;
    let prot = libc::PROT_READ | libc::PROT_WRITE;

    let ptr = unsafe { libc::mmap(ptr::null_mut(), len, prot, flags, -1, 0) };
    if ptr == libc::MAP_FAILED {
        return Err(Error::last_os_error());
    }
    Ok(ptr.cast::<u8>())
}

/// Unmaps a region previously returned by [`map_raw`] or [`remap_raw`].
///
/// # Safety
///
/// `ptr` must be a mapping of exactly `len` bytes owned by the caller.
pub unsafe fn unmap_raw(ptr: *mut u8, len: usize) {
    if len > 0 {
        unsafe {
            libc::munmap(ptr.cast::<libc::c_void>(), len);
        }
    }
}

/// Grows or shrinks a mapping in place where the platform allows it,
/// preserving contents and possibly relocating.
///
/// Only Linux exposes `mremap`; every other Unix falls back to returning
/// `None`, telling the caller to map a new region, copy, and unmap the old
/// one itself.
///
/// # Safety
///
/// `ptr` must be a mapping of exactly `old_len` bytes owned by the caller.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub unsafe fn remap_raw(ptr: *mut u8, old_len: usize, new_len: usize) -> Option<*mut u8> {
    let result = unsafe {
        libc::mremap(
            ptr.cast::<libc::c_void>(),
            old_len,
            new_len,
            libc::MREMAP_MAYMOVE,
        )
    };
    if result == libc::MAP_FAILED {
        None
    } else {
        Some(result.cast::<u8>())
    }
}

/// See the Linux implementation; non-Linux Unixes have no in-place remap
/// primitive, so this always reports "unsupported".
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub unsafe fn remap_raw(_ptr: *mut u8, _old_len: usize, _new_len: usize) -> Option<*mut u8> {
    None
}
