//! The page-aligned scratch buffer (C2): [`PageBuffer`].
//!
//! Grounded in `original_source/src/page_size.cpp`'s approach of caching
//! `sysconf(_SC_PAGESIZE)` once, since the spec's design notes call the page
//! size "a read-only property of the process" safe to cache on first use.

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;
use std::sync::OnceLock;

use crate::buf::RefBuffer;

static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

/// The host's page size in bytes, queried via `sysconf(_SC_PAGESIZE)` once
/// and cached for the lifetime of the process.
pub fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(|| {
        let rc = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if rc <= 0 {
            4096
        } else {
            rc as usize
        }
    })
}

/// A scratch buffer exactly one host page long, reused for the lifetime of
/// its owner (typically the reactor itself) rather than allocated per call.
///
/// Unlike [`crate::buf::OwningBuffer`], this is not `Vec<u8>`-backed: the
/// spec requires the base address itself to be page-aligned, which a plain
/// `Vec` allocation does not guarantee, so this allocates directly via
/// `std::alloc` with a page-aligned [`Layout`].
pub struct PageBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

impl PageBuffer {
    fn layout(len: usize) -> Layout {
        Layout::from_size_align(len, page_size()).expect("page size is a valid alignment")
    }

    /// Allocate a fresh, zero-filled page-sized buffer whose base address is
    /// page-aligned.
    pub fn new() -> PageBuffer {
        let len = page_size();
        let layout = Self::layout(len);
        // SAFETY: `layout` has non-zero size (the page size is always > 0).
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).unwrap_or_else(|| alloc::handle_alloc_error(layout));
        PageBuffer { ptr, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The buffer's base address, guaranteed aligned to [`page_size`].
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` points at `len` initialized, live bytes for the
        // lifetime of this `PageBuffer`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: see `as_slice`; `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_ref_buffer(&mut self) -> RefBuffer<'_> {
        RefBuffer::from_mut_slice(self.as_mut_slice())
    }
}

impl Drop for PageBuffer {
    fn drop(&mut self) {
        // SAFETY: `ptr` was allocated by `alloc_zeroed` with the same layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), Self::layout(self.len)) };
    }
}

impl Default for PageBuffer {
    fn default() -> PageBuffer {
        PageBuffer::new()
    }
}

impl fmt::Debug for PageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageBuffer").field("len", &self.len).finish()
    }
}

// SAFETY: `PageBuffer` owns its allocation outright; no interior aliasing.
unsafe impl Send for PageBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_a_sane_power_of_two() {
        let size = page_size();
        assert!(size >= 4096);
        assert_eq!(size & (size - 1), 0, "page size {size} is not a power of two");
    }

    #[test]
    fn page_buffer_matches_host_page_size() {
        let buf = PageBuffer::new();
        assert_eq!(buf.len(), page_size());
    }

    #[test]
    fn page_size_is_cached_and_stable_across_calls() {
        assert_eq!(page_size(), page_size());
    }

    #[test]
    fn page_buffer_base_is_page_aligned() {
        let buf = PageBuffer::new();
        assert_eq!(buf.as_ptr() as usize % page_size(), 0);
    }

    #[test]
    fn page_buffer_is_zero_filled() {
        let buf = PageBuffer::new();
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }
}
