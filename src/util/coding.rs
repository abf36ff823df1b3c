//! Unsigned LEB128 varints, used to persist chunk positions.

use bytes::BufMut;

/// Longest encoding of a `u64`.
pub const MAX_VARINT64_LEN: usize = 10;

/// Longest encoding of a `u32`.
pub const MAX_VARINT32_LEN: usize = 5;

/// Append `value` to `buf`, returning the number of bytes written.
pub fn put_uvarint<B: BufMut>(buf: &mut B, value: u64) -> usize {
    let len = uvarint_len(value);
    let mut rest = value;
    for _ in 1..len {
        buf.put_u8(rest as u8 | 0x80);
        rest >>= 7;
    }
    buf.put_u8(rest as u8);
    len
}

/// Read a varint of at most `max_len` bytes from the front of `buf`.
///
/// On success `buf` is advanced past the varint. Returns `None` when the
/// input ends early or the encoding is longer than `max_len`.
pub fn get_uvarint(buf: &mut &[u8], max_len: usize) -> Option<u64> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().take(max_len).enumerate() {
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            *buf = &buf[i + 1..];
            return Some(value);
        }
    }
    None
}

/// Read a varint that must fit in a `u32`.
pub fn get_uvarint32(buf: &mut &[u8]) -> Option<u32> {
    let mut peek = *buf;
    let value = u32::try_from(get_uvarint(&mut peek, MAX_VARINT32_LEN)?).ok()?;
    *buf = peek;
    Some(value)
}

/// Read a varint of up to 64 bits.
pub fn get_uvarint64(buf: &mut &[u8]) -> Option<u64> {
    get_uvarint(buf, MAX_VARINT64_LEN)
}

/// Encoded length of `value`.
pub fn uvarint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}
