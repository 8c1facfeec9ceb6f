//! Self-describing variable-width integer codec
//!
//! The position of the first set bit among the low four bits of the first
//! byte selects the total width. Payload bits sit above the tag, assembled
//! little-endian:
//!
//! - `...1` — 1 byte, 7 payload bits
//! - `..10` — 2 bytes, 14 payload bits
//! - `.100` — 4 bytes, 29 payload bits
//! - `1000` — 8 bytes, 57 payload bits
//!
//! A fixed-width mode forces the 4-byte encoding regardless of magnitude so
//! that runs of values can be bulk-read at a constant stride.

use std::io::{Read, Write};

use crate::error::{MurexError, Result};

/// Encoded width of a varint, decoded once from the tag bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    One,
    Two,
    Four,
    Eight,
}

impl Width {
    /// Total encoded length in bytes, tag included.
    pub const fn len(self) -> usize {
        match self {
            Width::One => 1,
            Width::Two => 2,
            Width::Four => 4,
            Width::Eight => 8,
        }
    }

    /// Number of low bits used by the tag.
    const fn tag_bits(self) -> u32 {
        match self {
            Width::One => 1,
            Width::Two => 2,
            Width::Four => 3,
            Width::Eight => 4,
        }
    }

    /// Largest value representable at this width.
    pub const fn max_value(self) -> u64 {
        match self {
            Width::One => (1 << 7) - 1,
            Width::Two => (1 << 14) - 1,
            Width::Four => (1 << 29) - 1,
            Width::Eight => (1 << 57) - 1,
        }
    }

    /// Smallest width that can hold `value`.
    pub fn for_value(value: u64) -> Result<Width> {
        if value <= Width::One.max_value() {
            Ok(Width::One)
        } else if value <= Width::Two.max_value() {
            Ok(Width::Two)
        } else if value <= Width::Four.max_value() {
            Ok(Width::Four)
        } else if value <= Width::Eight.max_value() {
            Ok(Width::Eight)
        } else {
            Err(MurexError::format(format!(
                "value {value} too large for varint encoding"
            )))
        }
    }

    /// Decode the width from the tag bits of the first byte.
    pub fn from_first_byte(byte: u8) -> Result<Width> {
        if byte & 1 != 0 {
            Ok(Width::One)
        } else if byte & 2 != 0 {
            Ok(Width::Two)
        } else if byte & 4 != 0 {
            Ok(Width::Four)
        } else if byte & 8 != 0 {
            Ok(Width::Eight)
        } else {
            Err(MurexError::format(format!(
                "invalid varint tag byte {byte:#04x}"
            )))
        }
    }
}

fn write_at_width<W: Write>(writer: &mut W, value: u64, width: Width) -> Result<()> {
    let tagged = (value << width.tag_bits()) | (1 << (width.tag_bits() - 1));
    let bytes = tagged.to_le_bytes();
    writer.write_all(&bytes[..width.len()])?;
    Ok(())
}

/// Encode a value at the smallest width that holds it.
pub fn write_vnum<W: Write>(writer: &mut W, value: u64) -> Result<()> {
    write_at_width(writer, value, Width::for_value(value)?)
}

/// Encode a value at the 4-byte width unconditionally.
///
/// Values of 2^29 and above do not fit and are a hard error; callers that
/// need them must use the variable encoding.
pub fn write_vnum_fixed<W: Write>(writer: &mut W, value: u64) -> Result<()> {
    if value > Width::Four.max_value() {
        return Err(MurexError::format(format!(
            "value {value} too large for fixed-width varint"
        )));
    }
    write_at_width(writer, value, Width::Four)
}

/// Decode one varint.
pub fn read_vnum<R: Read>(reader: &mut R) -> Result<u64> {
    let mut first = [0u8; 1];
    reader.read_exact(&mut first)?;
    let width = Width::from_first_byte(first[0])?;

    let mut bytes = [0u8; 8];
    bytes[0] = first[0];
    reader.read_exact(&mut bytes[1..width.len()])?;
    Ok(u64::from_le_bytes(bytes) >> width.tag_bits())
}

/// Decode one varint, rejecting values that do not fit a u32.
pub fn read_vnum_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let value = read_vnum(reader)?;
    u32::try_from(value)
        .map_err(|_| MurexError::format(format!("varint {value} exceeds 32 bits")))
}

/// Bulk-read `count` fixed-width values.
///
/// The run must have been written with [`write_vnum_fixed`]; each 4-byte
/// little-endian word carries the `.100` tag in its low bits, which is
/// validated and shifted out.
pub fn read_fixed_u32_run<R: Read>(reader: &mut R, count: usize) -> Result<Vec<u32>> {
    let mut raw = vec![0u8; count * 4];
    reader.read_exact(&mut raw)?;

    let mut out = Vec::with_capacity(count);
    for chunk in raw.chunks_exact(4) {
        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if word & 0b111 != 0b100 {
            return Err(MurexError::format(format!(
                "fixed-width varint run out of alignment (word {word:#010x})"
            )));
        }
        out.push(word >> 3);
    }
    Ok(out)
}

/// Write a length-prefixed string.
pub fn write_str<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    write_vnum(writer, s.len() as u64)?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}

/// Read a length-prefixed string.
pub fn read_str<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_vnum(reader)? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| MurexError::format(format!("non-UTF-8 term key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(value: u64) -> u64 {
        let mut buf = Vec::new();
        write_vnum(&mut buf, value).unwrap();
        read_vnum(&mut Cursor::new(buf)).unwrap()
    }

    #[test]
    fn test_roundtrip_at_width_boundaries() {
        for value in [
            0,
            1,
            127,
            128,
            16_383,
            16_384,
            (1 << 29) - 1,
            1 << 29,
            (1 << 57) - 1,
        ] {
            assert_eq!(roundtrip(value), value, "value {value}");
        }
    }

    #[test]
    fn test_encoded_widths() {
        let cases = [
            (0u64, 1usize),
            (127, 1),
            (128, 2),
            (16_383, 2),
            (16_384, 4),
            ((1 << 29) - 1, 4),
            (1 << 29, 8),
            ((1 << 57) - 1, 8),
        ];
        for (value, expected_len) in cases {
            let mut buf = Vec::new();
            write_vnum(&mut buf, value).unwrap();
            assert_eq!(buf.len(), expected_len, "value {value}");
        }
    }

    #[test]
    fn test_value_too_large() {
        let mut buf = Vec::new();
        assert!(write_vnum(&mut buf, 1 << 57).is_err());
    }

    #[test]
    fn test_fixed_width_stride() {
        let values = [0u64, 5, 300, 1_000_000, (1 << 29) - 1];
        let mut buf = Vec::new();
        for &v in &values {
            write_vnum_fixed(&mut buf, v).unwrap();
        }
        assert_eq!(buf.len(), values.len() * 4);

        let decoded = read_fixed_u32_run(&mut Cursor::new(buf), values.len()).unwrap();
        let expected: Vec<u32> = values.iter().map(|&v| v as u32).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_fixed_width_rejects_oversized() {
        let mut buf = Vec::new();
        assert!(write_vnum_fixed(&mut buf, 1 << 29).is_err());
    }

    #[test]
    fn test_fixed_run_detects_misalignment() {
        // A 1-byte encoding in the middle of a "fixed" run shifts every
        // following word off stride.
        let mut buf = Vec::new();
        write_vnum_fixed(&mut buf, 10).unwrap();
        write_vnum(&mut buf, 3).unwrap();
        write_vnum_fixed(&mut buf, 20).unwrap();
        assert!(read_fixed_u32_run(&mut Cursor::new(buf), 2).is_err());
    }

    #[test]
    fn test_invalid_tag_byte() {
        let buf = vec![0b1111_0000u8, 0, 0, 0, 0, 0, 0, 0];
        assert!(read_vnum(&mut Cursor::new(buf)).is_err());
    }

    #[test]
    fn test_truncated_stream() {
        let mut buf = Vec::new();
        write_vnum(&mut buf, 1_000_000).unwrap();
        buf.truncate(2);
        assert!(read_vnum(&mut Cursor::new(buf)).is_err());
    }

    #[test]
    fn test_read_vnum_u32_rejects_wide_values() {
        let mut buf = Vec::new();
        write_vnum(&mut buf, u64::from(u32::MAX) + 1).unwrap();
        assert!(read_vnum_u32(&mut Cursor::new(buf)).is_err());
    }

    #[test]
    fn test_string_roundtrip() {
        let mut buf = Vec::new();
        write_str(&mut buf, "HELLO").unwrap();
        write_str(&mut buf, "").unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_str(&mut cursor).unwrap(), "HELLO");
        assert_eq!(read_str(&mut cursor).unwrap(), "");
    }

    #[test]
    fn test_mixed_stream_decodes_in_order() {
        let values = [3u64, 40_000, 7, 1 << 40, 255];
        let mut buf = Vec::new();
        for &v in &values {
            write_vnum(&mut buf, v).unwrap();
        }
        let mut cursor = Cursor::new(buf);
        for &v in &values {
            assert_eq!(read_vnum(&mut cursor).unwrap(), v);
        }
    }
}
