use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};

use byteorder::{BigEndian, WriteBytesExt};
use log::{debug, error};

use crate::constants::LENGTH_PLACEHOLDER;

/// Writes a `u32` length in front of a block whose size is only known once it is written.
///
/// Creating the guard reserves the 4-byte length slot. Everything written through the guard
/// (it dereferences to the underlying writer) counts towards the block. [`LengthWriter::finish`]
/// seeks back, fills in the length and returns to the end of the block; if the guard is dropped
/// without `finish`, for example because a `?` bailed out, the length is filled in on drop
/// instead.
///
/// Nested blocks take one guard each, created through the outer guard:
///
/// ```ignore
/// let mut outer = LengthWriter::new(writer)?;
/// let mut inner = LengthWriter::new(&mut *outer)?;
/// inner.write_all(b"payload")?;
/// inner.finish()?;
/// outer.finish()?;
/// ```
pub struct LengthWriter<'a, W: Write + Seek> {
    writer: &'a mut W,
    length_position: u64,
    start_position: u64,
    done: bool,
}

impl<'a, W: Write + Seek> LengthWriter<'a, W> {
    pub fn new(writer: &'a mut W) -> io::Result<Self> {
        let length_position = writer.stream_position()?;
        writer.write_u32::<BigEndian>(LENGTH_PLACEHOLDER)?;
        let start_position = writer.stream_position()?;

        Ok(Self {
            writer,
            length_position,
            start_position,
            done: false,
        })
    }

    /// Stream position of the first payload byte.
    pub fn start_position(&self) -> u64 {
        self.start_position
    }

    /// Backpatches the length and returns it.
    pub fn finish(mut self) -> io::Result<u32> {
        self.backpatch()
    }

    fn backpatch(&mut self) -> io::Result<u32> {
        self.done = true;

        let end_position = self.writer.stream_position()?;
        let length = end_position
            .checked_sub(self.start_position)
            .and_then(|len| u32::try_from(len).ok())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "block from {} to {} does not fit a u32 length",
                        self.start_position, end_position
                    ),
                )
            })?;

        self.writer.seek(SeekFrom::Start(self.length_position))?;
        self.writer.write_u32::<BigEndian>(length)?;
        self.writer.seek(SeekFrom::Start(end_position))?;

        debug!(
            "Backpatched block length {} at offset {}",
            length, self.length_position
        );
        Ok(length)
    }
}

impl<W: Write + Seek> Deref for LengthWriter<'_, W> {
    type Target = W;

    fn deref(&self) -> &W {
        self.writer
    }
}

impl<W: Write + Seek> DerefMut for LengthWriter<'_, W> {
    fn deref_mut(&mut self) -> &mut W {
        self.writer
    }
}

impl<W: Write + Seek> Drop for LengthWriter<'_, W> {
    fn drop(&mut self) {
        if !self.done {
            if let Err(e) = self.backpatch() {
                error!(
                    "Failed to backpatch block length at offset {}: {}",
                    self.length_position, e
                );
            }
        }
    }
}

/// Forward-only variant of [`LengthWriter`] for sinks that cannot seek.
///
/// The block body is produced into an in-memory buffer (which can seek, so nested
/// [`LengthWriter`]s still work inside it), then written out as length followed by body.
pub fn write_length_prefixed<W, F, E>(writer: &mut W, body: F) -> Result<u32, E>
where
    W: Write,
    F: FnOnce(&mut Cursor<Vec<u8>>) -> Result<(), E>,
    E: From<io::Error>,
{
    let mut buffer = Cursor::new(Vec::new());
    body(&mut buffer)?;

    let buffer = buffer.into_inner();
    let length = u32::try_from(buffer.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("block of {} bytes does not fit a u32 length", buffer.len()),
        )
    })?;

    writer.write_u32::<BigEndian>(length)?;
    writer.write_all(&buffer)?;
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;

    fn block_with(payload_len: usize) -> Vec<u8> {
        let mut cursor = Cursor::new(vec![0xEE; 3]);
        cursor.set_position(3);
        {
            let mut block = LengthWriter::new(&mut cursor).unwrap();
            assert_eq!(block.start_position(), 7);
            block.write_all(&vec![0x5A; payload_len]).unwrap();
            assert_eq!(block.finish().unwrap() as usize, payload_len);
        }
        assert_eq!(cursor.position() as usize, 3 + 4 + payload_len);
        cursor.into_inner()
    }

    #[test]
    fn test_backpatched_length_matches_payload() {
        for len in [0usize, 1, 4096] {
            let out = block_with(len);
            assert_eq!(&out[..3], &[0xEE; 3]);
            let declared = (&out[3..7]).read_u32::<BigEndian>().unwrap();
            assert_eq!(declared as usize, len);
            assert_eq!(out.len(), 7 + len);
        }
    }

    #[test]
    fn test_drop_backpatches() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut block = LengthWriter::new(&mut cursor).unwrap();
            block.write_all(b"abcde").unwrap();
        }
        let out = cursor.into_inner();
        assert_eq!(&out[..4], &5u32.to_be_bytes());
    }

    #[test]
    fn test_backpatch_on_error_path() {
        fn failing(cursor: &mut Cursor<Vec<u8>>) -> io::Result<()> {
            let mut block = LengthWriter::new(cursor)?;
            block.write_all(b"xy")?;
            Err(io::Error::new(io::ErrorKind::Other, "boom"))
        }

        let mut cursor = Cursor::new(Vec::new());
        assert!(failing(&mut cursor).is_err());
        assert_eq!(&cursor.get_ref()[..4], &2u32.to_be_bytes());
        assert_eq!(cursor.position(), 6);
    }

    #[test]
    fn test_nested_blocks() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut outer = LengthWriter::new(&mut cursor).unwrap();
            outer.write_all(b"ab").unwrap();
            {
                let mut inner = LengthWriter::new(&mut *outer).unwrap();
                inner.write_all(b"cde").unwrap();
                assert_eq!(inner.finish().unwrap(), 3);
            }
            outer.write_all(b"f").unwrap();
            assert_eq!(outer.finish().unwrap(), 2 + 4 + 3 + 1);
        }
        let out = cursor.into_inner();
        assert_eq!(
            out,
            [0, 0, 0, 10, b'a', b'b', 0, 0, 0, 3, b'c', b'd', b'e', b'f']
        );
    }

    #[test]
    fn test_forward_only_block() {
        for len in [0usize, 1, 4096] {
            let mut out = Vec::new();
            let written = write_length_prefixed(&mut out, |body| -> io::Result<()> {
                body.write_all(&vec![7; len])
            })
            .unwrap();
            assert_eq!(written as usize, len);
            assert_eq!(&out[..4], &(len as u32).to_be_bytes());
            assert_eq!(out.len(), 4 + len);
        }
    }
}
