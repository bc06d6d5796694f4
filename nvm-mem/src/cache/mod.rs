//! Cache-control primitives: flush, fence, prefetch and streaming stores.
//!
//! The architecture-specific instructions sit behind [`CacheBackend`], a
//! capability value with one variant per architecture family. The backend is
//! detected once per process ([`CacheBackend::detected`]); call sites never
//! branch on the target architecture themselves.
//!
//! # Instruction selection
//!
//! | Operation | x86-64 | AArch64 | Generic |
//! |-----------|--------|---------|---------|
//! | flush (writeback) | `clwb` > `clflushopt` > `clflush` | `dc cvac` | fence only |
//! | flush (writeback-invalidate) | `clflushopt` > `clflush` | `dc civac` | fence only |
//! | fence | `sfence` | `dsb st` | `SeqCst` fence |
//! | prefetch | `prefetcht0/1/2/nta` | `prfm pldl1keep/...` | none |
//! | streaming store | `movntdq` (16 B) or `vmovntdq` (32 B, AVX) | `stnp` (16 B) | plain copy |
//!
//! # Safety
//!
//! [`flush`] and [`write_nt`] take raw pointers and do not validate them:
//! passing unmapped or foreign memory is undefined behaviour. Prefetch never
//! faults and is safe on any address.
//!
//! # Example
//! ```rust
//! use nvm_mem::cache;
//!
//! let src = vec![0xABu8; 4096];
//! let mut dst = vec![0u8; 4096];
//!
//! cache::write_nt_slice(&mut dst, &src);
//! cache::fence();
//! cache::flush_slice(&dst);
//! assert_eq!(dst, src);
//! ```

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::CACHE_LINE_SIZE;

mod generic;
#[cfg(target_arch = "aarch64")]
mod arm;
#[cfg(target_arch = "x86_64")]
mod x86;

#[cfg(target_arch = "aarch64")]
pub use arm::{ArmCaps, ArmFlush};
pub use generic::GenericCaps;
#[cfg(target_arch = "x86_64")]
pub use x86::{X86Caps, X86Flush};

/// Which flavour of cache-line flush to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlushKind {
    /// Best writeback instruction the CPU offers.
    #[default]
    Auto,
    /// Write back and keep the line cached.
    Writeback,
    /// Write back and evict the line.
    WritebackInvalidate,
}

/// Cache level targeted by prefetch hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchLocality {
    /// All levels.
    #[default]
    T0,
    /// L2 and below.
    T1,
    /// L3 and below.
    T2,
    /// Non-temporal, minimise pollution.
    Nta,
}

/// Cache-control capability for the running CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    #[cfg(target_arch = "x86_64")]
    X86(X86Caps),
    #[cfg(target_arch = "aarch64")]
    Arm(ArmCaps),
    Generic(GenericCaps),
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        fn detect_native(flush: FlushKind, locality: PrefetchLocality) -> CacheBackend {
            CacheBackend::X86(X86Caps::detect(flush, locality))
        }
    } else if #[cfg(target_arch = "aarch64")] {
        fn detect_native(flush: FlushKind, locality: PrefetchLocality) -> CacheBackend {
            CacheBackend::Arm(ArmCaps::detect(flush, locality))
        }
    } else {
        fn detect_native(_flush: FlushKind, _locality: PrefetchLocality) -> CacheBackend {
            CacheBackend::generic()
        }
    }
}

impl CacheBackend {
    /// Probe the running CPU with the given preferences.
    pub fn detect(flush: FlushKind, locality: PrefetchLocality) -> Self {
        let backend = detect_native(flush, locality);
        log::debug!(
            "cache backend for {}: {} (flush={}, line={})",
            nvm_osal::host_arch(),
            backend.name(),
            backend.flush_instruction(),
            backend.line_size()
        );
        backend
    }

    /// The process-wide backend, detected on first use with default
    /// preferences.
    pub fn detected() -> &'static CacheBackend {
        static BACKEND: OnceLock<CacheBackend> = OnceLock::new();
        BACKEND.get_or_init(|| Self::detect(FlushKind::Auto, PrefetchLocality::T0))
    }

    /// Portable fallback with no cache-control instructions.
    pub const fn generic() -> Self {
        CacheBackend::Generic(GenericCaps)
    }

    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(target_arch = "x86_64")]
            CacheBackend::X86(_) => "x86",
            #[cfg(target_arch = "aarch64")]
            CacheBackend::Arm(_) => "arm",
            CacheBackend::Generic(_) => "generic",
        }
    }

    /// Mnemonic of the flush instruction in use.
    pub fn flush_instruction(&self) -> &'static str {
        match self {
            #[cfg(target_arch = "x86_64")]
            CacheBackend::X86(caps) => caps.flush.mnemonic(),
            #[cfg(target_arch = "aarch64")]
            CacheBackend::Arm(caps) => caps.flush.mnemonic(),
            CacheBackend::Generic(_) => "none",
        }
    }

    /// Stride used when walking a range line by line.
    pub fn line_size(&self) -> usize {
        match self {
            #[cfg(target_arch = "x86_64")]
            CacheBackend::X86(caps) => caps.line_size,
            #[cfg(target_arch = "aarch64")]
            CacheBackend::Arm(caps) => caps.line_size,
            CacheBackend::Generic(_) => CACHE_LINE_SIZE,
        }
    }

    /// Write back every cache line intersecting `[addr, addr + len)`, then
    /// fence. Unaligned bounds are widened to whole lines.
    ///
    /// # Safety
    ///
    /// Every byte of the widened range must belong to memory mapped in this
    /// process.
    #[inline]
    pub unsafe fn flush(&self, addr: *const u8, len: usize) {
        match self {
            #[cfg(target_arch = "x86_64")]
            CacheBackend::X86(caps) => unsafe { caps.flush_range(addr, len) },
            #[cfg(target_arch = "aarch64")]
            CacheBackend::Arm(caps) => unsafe { caps.flush_range(addr, len) },
            CacheBackend::Generic(caps) => caps.flush_range(addr, len),
        }
    }

    /// Store fence: orders earlier stores, flushes and streaming stores
    /// before later stores.
    #[inline]
    pub fn fence(&self) {
        match self {
            #[cfg(target_arch = "x86_64")]
            CacheBackend::X86(caps) => caps.fence(),
            #[cfg(target_arch = "aarch64")]
            CacheBackend::Arm(caps) => caps.fence(),
            CacheBackend::Generic(caps) => caps.fence(),
        }
    }

    /// Issue one prefetch hint per cache line in range. Never faults and
    /// never changes memory contents.
    #[inline]
    pub fn prefetch(&self, addr: *const u8, len: usize) {
        match self {
            #[cfg(target_arch = "x86_64")]
            CacheBackend::X86(caps) => caps.prefetch_range(addr, len),
            #[cfg(target_arch = "aarch64")]
            CacheBackend::Arm(caps) => caps.prefetch_range(addr, len),
            CacheBackend::Generic(caps) => caps.prefetch_range(addr, len),
        }
    }

    /// Copy `len` bytes with stores that bypass cache allocation.
    ///
    /// The stores are weakly ordered: call [`fence`](Self::fence) before
    /// relying on their visibility, and [`flush`](Self::flush) if they must
    /// be durable.
    ///
    /// # Safety
    ///
    /// `src` must be valid for `len` reads, `dst` valid for `len` writes, and
    /// the two ranges must not overlap.
    #[inline]
    pub unsafe fn write_nt(&self, dst: *mut u8, src: *const u8, len: usize) {
        match self {
            #[cfg(target_arch = "x86_64")]
            CacheBackend::X86(caps) => unsafe { caps.stream_copy(dst, src, len) },
            #[cfg(target_arch = "aarch64")]
            CacheBackend::Arm(caps) => unsafe { caps.stream_copy(dst, src, len) },
            CacheBackend::Generic(caps) => unsafe { caps.stream_copy(dst, src, len) },
        }
    }

    /// Spin-wait hint for busy loops.
    #[inline]
    pub fn pause(&self) {
        match self {
            #[cfg(target_arch = "x86_64")]
            CacheBackend::X86(caps) => caps.pause(),
            #[cfg(target_arch = "aarch64")]
            CacheBackend::Arm(caps) => caps.pause(),
            CacheBackend::Generic(caps) => caps.pause(),
        }
    }
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name(), self.flush_instruction())
    }
}

// ============================================================================
// Process-wide shorthands
// ============================================================================

/// [`CacheBackend::flush`] on the detected backend.
///
/// # Safety
///
/// See [`CacheBackend::flush`].
#[inline]
pub unsafe fn flush(addr: *const u8, len: usize) {
    unsafe { CacheBackend::detected().flush(addr, len) }
}

/// [`CacheBackend::fence`] on the detected backend.
#[inline]
pub fn fence() {
    CacheBackend::detected().fence();
}

/// [`CacheBackend::prefetch`] on the detected backend.
#[inline]
pub fn prefetch(addr: *const u8, len: usize) {
    CacheBackend::detected().prefetch(addr, len);
}

/// [`CacheBackend::write_nt`] on the detected backend.
///
/// # Safety
///
/// See [`CacheBackend::write_nt`].
#[inline]
pub unsafe fn write_nt(dst: *mut u8, src: *const u8, len: usize) {
    unsafe { CacheBackend::detected().write_nt(dst, src, len) }
}

/// [`CacheBackend::pause`] on the detected backend.
#[inline]
pub fn pause() {
    CacheBackend::detected().pause();
}

/// Flush the cache lines backing `data`.
#[inline]
pub fn flush_slice(data: &[u8]) {
    // a live slice is mapped for its whole length; lines widened past it
    // belong to the same pages
    unsafe { flush(data.as_ptr(), data.len()) }
}

/// Prefetch the cache lines backing `data`.
#[inline]
pub fn prefetch_slice(data: &[u8]) {
    prefetch(data.as_ptr(), data.len());
}

/// Streaming copy of `src` into `dst`.
///
/// # Panics
///
/// Panics if the two slices have different lengths.
#[inline]
pub fn write_nt_slice(dst: &mut [u8], src: &[u8]) {
    assert_eq!(
        dst.len(),
        src.len(),
        "destination and source slices have different lengths"
    );
    unsafe { write_nt(dst.as_mut_ptr(), src.as_ptr(), src.len()) }
}
