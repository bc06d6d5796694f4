//! AArch64 cache control.
//!
//! Lines are cleaned to the point of coherency with `dc cvac` (or cleaned and
//! invalidated with `dc civac`), followed by `dsb sy`. The data cache line
//! size comes from `CTR_EL0.DminLine`, which Linux exposes to EL0.

use std::arch::asm;
use std::ptr;

use super::{FlushKind, PrefetchLocality};
use crate::CACHE_LINE_SIZE;
use crate::align::cache_lines;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmFlush {
    DcCvac,
    DcCivac,
}

impl ArmFlush {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ArmFlush::DcCvac => "dc cvac",
            ArmFlush::DcCivac => "dc civac",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmCaps {
    pub(crate) flush: ArmFlush,
    pub(crate) line_size: usize,
    pub(crate) locality: PrefetchLocality,
}

impl ArmCaps {
    pub(crate) fn detect(kind: FlushKind, locality: PrefetchLocality) -> Self {
        let ctr: u64;
        unsafe {
            asm!("mrs {0}, ctr_el0", out(reg) ctr, options(nomem, nostack, preserves_flags));
        }
        // DminLine: log2 of the smallest data line, in 4-byte words
        let line_size = (4usize << ((ctr >> 16) & 0xF)).min(CACHE_LINE_SIZE);

        let flush = match kind {
            FlushKind::Auto | FlushKind::Writeback => ArmFlush::DcCvac,
            FlushKind::WritebackInvalidate => ArmFlush::DcCivac,
        };

        Self {
            flush,
            line_size,
            locality,
        }
    }

    #[inline]
    pub(crate) unsafe fn flush_range(&self, addr: *const u8, len: usize) {
        let lines = cache_lines(addr as usize, len, self.line_size).step_by(self.line_size);
        match self.flush {
            ArmFlush::DcCvac => {
                for line in lines {
                    unsafe { asm!("dc cvac, {0}", in(reg) line, options(nostack, preserves_flags)) };
                }
            }
            ArmFlush::DcCivac => {
                for line in lines {
                    unsafe { asm!("dc civac, {0}", in(reg) line, options(nostack, preserves_flags)) };
                }
            }
        }
        unsafe { asm!("dsb sy", options(nostack, preserves_flags)) };
    }

    #[inline]
    pub(crate) fn fence(&self) {
        unsafe { asm!("dsb st", options(nostack, preserves_flags)) };
    }

    #[inline]
    pub(crate) fn prefetch_range(&self, addr: *const u8, len: usize) {
        for line in cache_lines(addr as usize, len, self.line_size).step_by(self.line_size) {
            unsafe {
                match self.locality {
                    PrefetchLocality::T0 => {
                        asm!("prfm pldl1keep, [{0}]", in(reg) line, options(nostack, readonly, preserves_flags))
                    }
                    PrefetchLocality::T1 => {
                        asm!("prfm pldl2keep, [{0}]", in(reg) line, options(nostack, readonly, preserves_flags))
                    }
                    PrefetchLocality::T2 => {
                        asm!("prfm pldl3keep, [{0}]", in(reg) line, options(nostack, readonly, preserves_flags))
                    }
                    PrefetchLocality::Nta => {
                        asm!("prfm pldl1strm, [{0}]", in(reg) line, options(nostack, readonly, preserves_flags))
                    }
                }
            }
        }
    }

    /// Unaligned head and tail use ordinary stores; the 16-byte aligned body
    /// uses `stnp`.
    #[inline]
    pub(crate) unsafe fn stream_copy(&self, dst: *mut u8, src: *const u8, len: usize) {
        let head = dst.align_offset(16).min(len);
        let body = (len - head) / 16 * 16;
        let tail = len - head - body;

        unsafe {
            ptr::copy_nonoverlapping(src, dst, head);
            let (dst, src) = (dst.add(head), src.add(head));
            let mut offset = 0;
            while offset < body {
                let lo = ptr::read_unaligned(src.add(offset).cast::<u64>());
                let hi = ptr::read_unaligned(src.add(offset + 8).cast::<u64>());
                asm!(
                    "stnp {lo}, {hi}, [{dst}]",
                    lo = in(reg) lo,
                    hi = in(reg) hi,
                    dst = in(reg) dst.add(offset),
                    options(nostack, preserves_flags)
                );
                offset += 16;
            }
            ptr::copy_nonoverlapping(src.add(body), dst.add(body), tail);
        }
    }

    #[inline]
    pub(crate) fn pause(&self) {
        unsafe { asm!("yield", options(nomem, nostack, preserves_flags)) };
    }
}
