use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

use super::string_to_latin1;
use crate::layer::format::Rect;

/// Longest text a Pascal string can hold.
pub const PASCAL_STRING_MAX: usize = 255;

/// PSD field writers on top of [`WriteBytesExt`].
pub trait PsdWriteExt: Write {
    fn write_signature(&mut self, signature: &[u8; 4]) -> io::Result<()> {
        self.write_all(signature)
    }

    /// Writes at most 255 characters behind a length byte, then zero-pads to an even
    /// total. Returns the number of bytes written.
    fn write_pascal_string(&mut self, text: &str) -> io::Result<usize> {
        let mut bytes = string_to_latin1(text);
        bytes.truncate(PASCAL_STRING_MAX);

        self.write_u8(bytes.len() as u8)?;
        self.write_all(&bytes)?;

        let mut written = bytes.len() + 1;
        if written % 2 == 1 {
            self.write_u8(0)?;
            written += 1;
        }
        Ok(written)
    }

    fn write_rect(&mut self, rect: &Rect) -> io::Result<()> {
        self.write_i32::<BigEndian>(rect.top)?;
        self.write_i32::<BigEndian>(rect.left)?;
        self.write_i32::<BigEndian>(rect.bottom())?;
        self.write_i32::<BigEndian>(rect.right())
    }
}

impl<W: Write + ?Sized> PsdWriteExt for W {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::PsdReadExt;
    use byteorder::ReadBytesExt;
    use std::io::Cursor;

    fn round_trip(text: &str) -> (String, usize) {
        let mut cursor = Cursor::new(Vec::new());
        let written = cursor.write_pascal_string(text).unwrap();
        assert_eq!(written, cursor.get_ref().len());
        cursor.set_position(0);
        let decoded = cursor.read_pascal_string().unwrap();
        assert_eq!(cursor.position() as usize, written);
        (decoded, written)
    }

    #[test]
    fn test_pascal_string_round_trip_lengths() {
        for len in [0usize, 1, 254, 255] {
            let text = "x".repeat(len);
            let (decoded, written) = round_trip(&text);
            assert_eq!(decoded, text);
            assert_eq!(written % 2, 0, "length {len} not padded to even");
        }
    }

    #[test]
    fn test_pascal_string_truncates_to_255() {
        let text: String = (0..300).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        let (decoded, written) = round_trip(&text);
        assert_eq!(decoded, &text[..255]);
        assert_eq!(written, 256);

        let (again, _) = round_trip(&decoded);
        assert_eq!(again, decoded);
    }

    #[test]
    fn test_integer_round_trip_endpoints() {
        let mut cursor = Cursor::new(Vec::new());
        for v in [0i16, -1, i16::MIN, i16::MAX] {
            cursor.write_i16::<BigEndian>(v).unwrap();
        }
        for v in [0u16, u16::MAX, 1] {
            cursor.write_u16::<BigEndian>(v).unwrap();
        }
        for v in [0i32, -1, i32::MIN, i32::MAX] {
            cursor.write_i32::<BigEndian>(v).unwrap();
        }
        for v in [0u32, u32::MAX, 1] {
            cursor.write_u32::<BigEndian>(v).unwrap();
        }
        for v in [0i64, -1, i64::MIN, i64::MAX] {
            cursor.write_i64::<BigEndian>(v).unwrap();
        }
        for v in [0u64, u64::MAX, 1] {
            cursor.write_u64::<BigEndian>(v).unwrap();
        }

        cursor.set_position(0);
        for v in [0i16, -1, i16::MIN, i16::MAX] {
            assert_eq!(cursor.read_i16::<BigEndian>().unwrap(), v);
        }
        for v in [0u16, u16::MAX, 1] {
            assert_eq!(cursor.read_u16::<BigEndian>().unwrap(), v);
        }
        for v in [0i32, -1, i32::MIN, i32::MAX] {
            assert_eq!(cursor.read_i32::<BigEndian>().unwrap(), v);
        }
        for v in [0u32, u32::MAX, 1] {
            assert_eq!(cursor.read_u32::<BigEndian>().unwrap(), v);
        }
        for v in [0i64, -1, i64::MIN, i64::MAX] {
            assert_eq!(cursor.read_i64::<BigEndian>().unwrap(), v);
        }
        for v in [0u64, u64::MAX, 1] {
            assert_eq!(cursor.read_u64::<BigEndian>().unwrap(), v);
        }
    }

    #[test]
    fn test_integers_are_big_endian() {
        let mut out = Vec::new();
        out.write_u32::<BigEndian>(0x0102_0304).unwrap();
        out.write_i16::<BigEndian>(-2).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 0xFF, 0xFE]);
    }

    #[test]
    fn test_write_rect_uses_edges() {
        let mut out = Vec::new();
        out.write_rect(&Rect::new(1, 2, 3, 4)).unwrap();
        let expected: Vec<u8> = [1i32, 2, 4, 6].iter().flat_map(|v| v.to_be_bytes()).collect();
        assert_eq!(out, expected);
    }
}
