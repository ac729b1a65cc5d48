//! Low-level helpers for reading and writing bit ranges of a record integer.
//!
//! Bits are addressed LSB-first: bit 0 is the least significant bit of the
//! record integer. Byte encodings are big-endian.

/// Widest record the 128 bit storage integer can hold.
pub const MAX_RECORD_BITS: usize = 128;

/// Widest `bool`/`uint`/`int` field.
pub const MAX_SCALAR_BITS: usize = 64;

/// Mask covering the low `width` bits.
pub fn mask(width: usize) -> u128 {
    if width >= MAX_RECORD_BITS {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Reads `width` bits starting at bit `start` as an unsigned value.
pub fn extract(value: u128, start: usize, width: usize) -> u128 {
    if start >= MAX_RECORD_BITS {
        return 0;
    }

    (value >> start) & mask(width)
}

/// Clears the bit range `[start, start + width)` of `value` and ORs in the low
/// `width` bits of `bits`.
pub fn splice(value: u128, start: usize, width: usize, bits: u128) -> u128 {
    if start >= MAX_RECORD_BITS {
        return value;
    }

    let m = mask(width);
    (value & !(m << start)) | ((bits & m) << start)
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: usize) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Two's complement bit pattern of `value` in `width` bits.
pub fn twos_complement(value: i128, width: usize) -> u128 {
    (value as u128) & mask(width)
}

/// Number of bytes needed to hold `width` bits.
pub fn byte_len(width: usize) -> usize {
    width.div_ceil(8)
}

/// Encodes the low `width` bits of `value` big-endian, zero-padded on the
/// most significant side.
pub fn to_bytes_be(value: u128, width: usize) -> Vec<u8> {
    let n = byte_len(width).min(16);
    value.to_be_bytes()[16 - n..].to_vec()
}

/// Decodes a big-endian byte slice of at most 16 bytes.
pub fn from_bytes_be(data: &[u8]) -> u128 {
    data.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128)
}
