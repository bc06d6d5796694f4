//! x86-64 cache control.
//!
//! Flush instructions are probed with CPUID: `clwb` (writeback, line stays
//! cached) and `clflushopt` (weakly ordered writeback + evict) are used when
//! present, `clflush` otherwise. Every flush range ends with `sfence`, which
//! is required for `clwb`/`clflushopt` and harmless for `clflush`.

use std::arch::asm;
use std::arch::x86_64::{
    __m128i, __m256i, _MM_HINT_NTA, _MM_HINT_T0, _MM_HINT_T1, _MM_HINT_T2, _mm_clflush,
    _mm_loadu_si128, _mm_pause, _mm_prefetch, _mm_sfence, _mm_stream_si128, _mm256_loadu_si256,
    _mm256_stream_si256,
};
use std::ptr;

use raw_cpuid::CpuId;

use super::{FlushKind, PrefetchLocality};
use crate::CACHE_LINE_SIZE;
use crate::align::cache_lines;

/// Flush instruction selected for this CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum X86Flush {
    Clflush,
    Clflushopt,
    Clwb,
}

impl X86Flush {
    pub fn mnemonic(self) -> &'static str {
        match self {
            X86Flush::Clflush => "clflush",
            X86Flush::Clflushopt => "clflushopt",
            X86Flush::Clwb => "clwb",
        }
    }

    /// Pick the instruction for `kind` given what the CPU supports.
    pub(crate) fn select(kind: FlushKind, has_clwb: bool, has_clflushopt: bool) -> Self {
        match kind {
            FlushKind::Auto | FlushKind::Writeback if has_clwb => X86Flush::Clwb,
            FlushKind::Auto | FlushKind::Writeback | FlushKind::WritebackInvalidate
                if has_clflushopt =>
            {
                X86Flush::Clflushopt
            }
            _ => X86Flush::Clflush,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct X86Caps {
    pub(crate) flush: X86Flush,
    pub(crate) line_size: usize,
    pub(crate) locality: PrefetchLocality,
    /// 32-byte streaming stores available.
    pub(crate) avx: bool,
}

impl X86Caps {
    pub(crate) fn detect(kind: FlushKind, locality: PrefetchLocality) -> Self {
        let cpuid = CpuId::new();
        let extended = cpuid.get_extended_feature_info();
        let has_clwb = extended.as_ref().is_some_and(|f| f.has_clwb());
        let has_clflushopt = extended.as_ref().is_some_and(|f| f.has_clflushopt());

        // CPUID.01H:EBX[15:8] reports the CLFLUSH line size in 8-byte units
        let line_size = cpuid
            .get_feature_info()
            .map(|f| usize::from(f.cflush_cache_line_size()) * 8)
            .filter(|size| size.is_power_of_two())
            .map_or(CACHE_LINE_SIZE, |size| size.min(CACHE_LINE_SIZE));

        let flush = X86Flush::select(kind, has_clwb, has_clflushopt);
        if kind == FlushKind::Writeback && flush != X86Flush::Clwb {
            log::warn!(
                "clwb is not supported on this CPU, writeback flush falls back to {}",
                flush.mnemonic()
            );
        }

        Self {
            flush,
            line_size,
            locality,
            avx: is_x86_feature_detected!("avx"),
        }
    }

    #[inline]
    pub(crate) unsafe fn flush_range(&self, addr: *const u8, len: usize) {
        let lines = cache_lines(addr as usize, len, self.line_size).step_by(self.line_size);
        match self.flush {
            X86Flush::Clflush => {
                for line in lines {
                    unsafe { _mm_clflush(line as *const u8) };
                }
            }
            X86Flush::Clflushopt => {
                for line in lines {
                    unsafe {
                        asm!("clflushopt byte ptr [{0}]", in(reg) line, options(nostack, preserves_flags));
                    }
                }
            }
            X86Flush::Clwb => {
                for line in lines {
                    unsafe {
                        asm!("clwb byte ptr [{0}]", in(reg) line, options(nostack, preserves_flags));
                    }
                }
            }
        }
        self.fence();
    }

    #[inline]
    pub(crate) fn fence(&self) {
        unsafe { _mm_sfence() };
    }

    #[inline]
    pub(crate) fn prefetch_range(&self, addr: *const u8, len: usize) {
        for line in cache_lines(addr as usize, len, self.line_size).step_by(self.line_size) {
            let p = line as *const i8;
            unsafe {
                match self.locality {
                    PrefetchLocality::T0 => _mm_prefetch::<_MM_HINT_T0>(p),
                    PrefetchLocality::T1 => _mm_prefetch::<_MM_HINT_T1>(p),
                    PrefetchLocality::T2 => _mm_prefetch::<_MM_HINT_T2>(p),
                    PrefetchLocality::Nta => _mm_prefetch::<_MM_HINT_NTA>(p),
                }
            }
        }
    }

    /// Unaligned head and tail use ordinary stores; the aligned body uses
    /// `movntdq`/`vmovntdq`.
    #[inline]
    pub(crate) unsafe fn stream_copy(&self, dst: *mut u8, src: *const u8, len: usize) {
        let width = if self.avx { 32 } else { 16 };
        let head = dst.align_offset(width).min(len);
        let body = (len - head) / width * width;
        let tail = len - head - body;

        unsafe {
            ptr::copy_nonoverlapping(src, dst, head);
            let (dst, src) = (dst.add(head), src.add(head));
            if self.avx {
                stream_avx(dst, src, body);
            } else {
                stream_sse2(dst, src, body);
            }
            ptr::copy_nonoverlapping(src.add(body), dst.add(body), tail);
        }
    }

    #[inline]
    pub(crate) fn pause(&self) {
        unsafe { _mm_pause() };
    }
}

/// `dst` must be 16-byte aligned and `len` a multiple of 16.
#[inline]
unsafe fn stream_sse2(dst: *mut u8, src: *const u8, len: usize) {
    let mut offset = 0;
    while offset < len {
        unsafe {
            let v = _mm_loadu_si128(src.add(offset).cast::<__m128i>());
            _mm_stream_si128(dst.add(offset).cast::<__m128i>(), v);
        }
        offset += 16;
    }
}

/// `dst` must be 32-byte aligned and `len` a multiple of 32.
#[target_feature(enable = "avx")]
unsafe fn stream_avx(dst: *mut u8, src: *const u8, len: usize) {
    let mut offset = 0;
    while offset < len {
        unsafe {
            let v = _mm256_loadu_si256(src.add(offset).cast::<__m256i>());
            _mm256_stream_si256(dst.add(offset).cast::<__m256i>(), v);
        }
        offset += 32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_selection() {
        use FlushKind::*;
        assert_eq!(X86Flush::select(Auto, true, true), X86Flush::Clwb);
        assert_eq!(X86Flush::select(Auto, false, true), X86Flush::Clflushopt);
        assert_eq!(X86Flush::select(Auto, false, false), X86Flush::Clflush);
        assert_eq!(X86Flush::select(Writeback, true, false), X86Flush::Clwb);
        assert_eq!(X86Flush::select(Writeback, false, true), X86Flush::Clflushopt);
        assert_eq!(
            X86Flush::select(WritebackInvalidate, true, true),
            X86Flush::Clflushopt
        );
        assert_eq!(
            X86Flush::select(WritebackInvalidate, true, false),
            X86Flush::Clflush
        );
    }

    #[test]
    fn test_every_supported_flush_runs() {
        let caps = X86Caps::detect(FlushKind::Auto, PrefetchLocality::T0);
        let buf = vec![0x11u8; 512];
        let mut candidates = vec![X86Flush::Clflush];
        if caps.flush != X86Flush::Clflush {
            candidates.push(caps.flush);
        }
        for flush in candidates {
            let caps = X86Caps { flush, ..caps };
            unsafe { caps.flush_range(buf.as_ptr().add(5), 300) };
        }
        assert!(buf.iter().all(|&b| b == 0x11));
    }

    #[test]
    fn test_sse2_path_without_avx() {
        let caps = X86Caps {
            avx: false,
            ..X86Caps::detect(FlushKind::Auto, PrefetchLocality::T0)
        };
        let src: Vec<u8> = (0..300u16).map(|i| i as u8).collect();
        let mut dst = vec![0u8; 310];
        unsafe { caps.stream_copy(dst.as_mut_ptr().add(7), src.as_ptr(), 300) };
        caps.fence();
        assert_eq!(&dst[7..307], &src[..]);
    }
}
