//! Portable fallback.
//!
//! Without cache-control instructions the best this backend can do is order
//! memory operations. Durability on such hosts comes from
//! [`Region::sync`](crate::Region::sync).

use std::ptr;

/// Capabilities of the portable backend (there are none).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenericCaps;

impl GenericCaps {
    #[inline]
    pub(crate) fn flush_range(&self, _addr: *const u8, _len: usize) {
        nvm_osal::barrier_full();
    }

    #[inline]
    pub(crate) fn fence(&self) {
        nvm_osal::barrier_full();
    }

    #[inline]
    pub(crate) fn prefetch_range(&self, _addr: *const u8, _len: usize) {}

    #[inline]
    pub(crate) unsafe fn stream_copy(&self, dst: *mut u8, src: *const u8, len: usize) {
        unsafe { ptr::copy_nonoverlapping(src, dst, len) };
    }

    #[inline]
    pub(crate) fn pause(&self) {
        std::thread::yield_now();
    }
}
