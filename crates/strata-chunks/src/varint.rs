//! Self-delimiting prefix varints
//!
//! The number of leading one bits in the first byte is the number of extra
//! bytes that follow, so a decoder knows the encoded length from the first
//! byte alone:
//!
//! ```text
//! 0xxxxxxx                         7 bits
//! 10xxxxxx + 1 byte               14 bits
//! 110xxxxx + 2 bytes              21 bits
//! ...
//! 11111110 + 7 bytes              56 bits
//! 11111111 + 8 bytes              64 bits
//! ```
//!
//! Extra bytes are big-endian. The index record scanner depends on this
//! layout; the two change together under `INDEX_FORMAT_VERSION`.

/// Longest possible encoding
pub const MAX_VARINT_LEN: usize = 9;

/// Number of extra bytes needed after the prefix byte
fn extra_bytes(value: u64) -> usize {
    let bits = (64 - value.leading_zeros()) as usize;
    if bits > 56 {
        8
    } else {
        (bits.saturating_sub(7) + 6) / 7
    }
}

/// Encoded size of `value` in bytes
pub fn encoded_size(value: u64) -> usize {
    extra_bytes(value) + 1
}

/// Append the encoding of `value` to `out`.
pub fn encode(value: u64, out: &mut Vec<u8>) {
    let extra = extra_bytes(value);
    if extra == 8 {
        out.push(0xFF);
        out.extend_from_slice(&value.to_be_bytes());
        return;
    }
    let prefix = !(0xFFu8 >> extra);
    out.push(prefix | (value >> (8 * extra)) as u8);
    let tail = value.to_be_bytes();
    out.extend_from_slice(&tail[8 - extra..]);
}

/// Total encoded length announced by a first byte
pub fn encoded_len(first: u8) -> usize {
    first.leading_ones() as usize + 1
}

/// Decode a varint at the start of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None` if `bytes`
/// is shorter than the length its first byte announces.
pub fn decode(bytes: &[u8]) -> Option<(u64, usize)> {
    let first = *bytes.first()?;
    let len = encoded_len(first);
    if bytes.len() < len {
        return None;
    }
    let extra = len - 1;
    let mut value = if extra == 8 {
        0
    } else {
        (first & (0x7Fu8 >> extra)) as u64
    };
    for b in &bytes[1..len] {
        value = (value << 8) | *b as u64;
    }
    Some((value, len))
}
