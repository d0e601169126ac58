//! Overflow-safe bounds arithmetic
//!
//! Offsets read from an untrusted file can be anywhere in `u32`/`usize`
//! range, so `offset + len > limit` may wrap. These helpers only ever
//! subtract from values already known to be no larger than `limit`.

/// Returns true when `[offset, offset + len)` lies inside `[0, limit)`.
///
/// Written as `len <= limit && offset <= limit - len`, so neither side
/// can overflow or underflow.
#[inline]
pub fn fits(offset: usize, len: usize, limit: usize) -> bool {
    len <= limit && offset <= limit - len
}

/// Returns the exclusive end of `[offset, offset + len)` when it fits in `limit`.
#[inline]
pub fn end_of(offset: usize, len: usize, limit: usize) -> Option<usize> {
    if fits(offset, len, limit) {
        Some(offset + len)
    } else {
        None
    }
}

/// Borrow `len` bytes at `offset` from `buf`, or `None` if they fall outside it.
#[inline]
pub fn slice_at(buf: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    let end = end_of(offset, len, buf.len())?;
    Some(&buf[offset..end])
}
