//! Big-endian byte packing, as the target engine expects it.
//!
//! Producers use these helpers to turn record fields into payload byte
//! arrays before handing them to the linker; the linker itself uses only
//! [`patch_u32`] for its link-phase pointer writes.

use num_traits::PrimInt;

/// Encodes any primitive integer up to 64 bits wide as big-endian bytes.
///
/// Signed values are emitted in two's complement, so `-1i16` becomes
/// `[0xFF, 0xFF]`.
pub fn encode_int<T: PrimInt>(value: T) -> Vec<u8> {
    let width = std::mem::size_of::<T>();
    // Two's-complement bit pattern, regardless of signedness.
    let raw = value
        .to_i64()
        .map(|v| v as u64)
        .or_else(|| value.to_u64())
        .unwrap_or(0);
    (0..width).rev().map(|i| (raw >> (i * 8)) as u8).collect()
}

pub fn encode_u8(value: u8) -> Vec<u8> {
    encode_int(value)
}

pub fn encode_u16(value: u16) -> Vec<u8> {
    encode_int(value)
}

pub fn encode_u32(value: u32) -> Vec<u8> {
    encode_int(value)
}

pub fn encode_i16(value: i16) -> Vec<u8> {
    encode_int(value)
}

pub fn encode_i32(value: i32) -> Vec<u8> {
    encode_int(value)
}

/// Encodes a string as zero-terminated ASCII.
pub fn encode_str_z(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0x00);
    bytes
}

/// Reads a big-endian u16 from the first 2 bytes of `bytes`.
///
/// Requires at least 2 bytes; indexing panics otherwise, the same way
/// [`patch_u32`] treats a short buffer.
pub fn decode_u16(bytes: &[u8]) -> u16 {
    bytes[..2].iter().fold(0, |acc, &b| (acc << 8) | u16::from(b))
}

/// Reads a big-endian u32 from the first 4 bytes of `bytes`.
///
/// Requires at least 4 bytes; indexing panics otherwise.
pub fn decode_u32(bytes: &[u8]) -> u32 {
    bytes[..4].iter().fold(0, |acc, &b| (acc << 8) | u32::from(b))
}

/// Overwrites 4 bytes at `offset` with the big-endian encoding of `value`.
///
/// Requires 4 bytes of room at `offset`; indexing panics otherwise, which
/// indicates a broken offset calculation upstream.
pub fn patch_u32(buf: &mut [u8], offset: usize, value: u32) {
    for (i, slot) in buf[offset..offset + 4].iter_mut().enumerate() {
        *slot = (value >> (8 * (3 - i))) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_big_endian() {
        assert_eq!(vec![0xDE, 0xAD, 0xBE, 0xEF], encode_u32(0xDEADBEEF));
        assert_eq!(vec![0x12, 0x34], encode_u16(0x1234));
        assert_eq!(vec![0x7F], encode_u8(0x7F));
    }

    #[test]
    fn encode_signed_is_twos_complement() {
        assert_eq!(vec![0xFF, 0xFF], encode_i16(-1));
        assert_eq!(vec![0xFF, 0xFF, 0xFF, 0xFE], encode_i32(-2));
        assert_eq!(vec![0x00, 0x10], encode_i16(16));
    }

    #[test]
    fn decode_reverses_encode() {
        assert_eq!(0xDEADBEEF, decode_u32(&encode_u32(0xDEADBEEF)));
        assert_eq!(0x0000, decode_u16(&[0x00, 0x00]));
        assert_eq!(0xCAFE, decode_u16(&encode_u16(0xCAFE)));
    }

    #[test]
    fn decode_reads_only_the_leading_bytes() {
        assert_eq!(0x01020304, decode_u32(&[0x01, 0x02, 0x03, 0x04, 0xFF]));
        assert_eq!(0x0102, decode_u16(&[0x01, 0x02, 0xFF, 0xFF]));
    }

    #[test]
    #[should_panic]
    fn decode_u32_rejects_short_input() {
        decode_u32(&[0x01, 0x02, 0x03]);
    }

    #[test]
    #[should_panic]
    fn decode_u16_rejects_short_input() {
        decode_u16(&[0x01]);
    }

    #[test]
    fn string_is_zero_terminated() {
        assert_eq!(vec![b'h', b'i', 0x00], encode_str_z("hi"));
        assert_eq!(vec![0x00], encode_str_z(""));
    }

    #[test]
    fn patch_overwrites_in_place() {
        let mut buf = vec![0u8; 12];
        patch_u32(&mut buf, 4, 0x00C0FFEE);
        assert_eq!(
            vec![0, 0, 0, 0, 0x00, 0xC0, 0xFF, 0xEE, 0, 0, 0, 0],
            buf
        );
    }
}
