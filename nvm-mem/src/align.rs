//! Alignment arithmetic.
//!
//! The `*_pow2` variants require `align` to be a power of two; the others
//! accept any non-zero alignment.

use std::ops::Range;

/// Round `value` down to a multiple of `align`.
#[inline]
pub const fn align_floor(value: usize, align: usize) -> usize {
    value / align * align
}

/// Round `value` up to a multiple of `align`.
#[inline]
pub const fn align_ceil(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

#[inline]
pub const fn is_pow2(value: usize) -> bool {
    value != 0 && value & (value - 1) == 0
}

#[inline]
pub const fn floor_pow2(value: usize, align: usize) -> usize {
    value & !(align - 1)
}

#[inline]
pub const fn ceil_pow2(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Non-zero and a multiple of `align`.
#[inline]
pub const fn is_aligned_pow2(value: usize, align: usize) -> bool {
    value != 0 && value & (align - 1) == 0
}

/// Line-aligned address range covering every line that intersects
/// `[addr, addr + len)`.
///
/// An empty input range intersects no line and yields an empty range. A
/// range reaching the top of the address space ends at the last line
/// boundary, so the topmost partial line is not covered.
#[inline]
pub fn cache_lines(addr: usize, len: usize, line: usize) -> Range<usize> {
    debug_assert!(is_pow2(line));
    let start = floor_pow2(addr, line);
    if len == 0 {
        return start..start;
    }
    let last = addr.saturating_add(len - 1);
    let end = floor_pow2(last, line)
        .checked_add(line)
        .unwrap_or(floor_pow2(usize::MAX, line));
    start..end
}
