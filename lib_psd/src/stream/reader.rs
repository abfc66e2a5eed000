use std::io::{self, Read};

use byteorder::{BigEndian, ReadBytesExt};

use super::latin1_to_string;
use crate::layer::format::Rect;

/// PSD field readers on top of [`ReadBytesExt`].
pub trait PsdReadExt: Read {
    /// Reads exactly `len` bytes into a new buffer.
    fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buffer = vec![0; len];
        self.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn read_signature(&mut self) -> io::Result<[u8; 4]> {
        let mut signature = [0; 4];
        self.read_exact(&mut signature)?;
        Ok(signature)
    }

    /// Reads a length byte and that many characters. When the length is even one padding
    /// byte follows, so the whole field always spans an even number of bytes.
    fn read_pascal_string(&mut self) -> io::Result<String> {
        let length = self.read_u8()? as usize;
        let text = self.read_bytes(length)?;
        if length % 2 == 0 {
            self.read_u8()?;
        }
        Ok(latin1_to_string(&text))
    }

    /// Reads top, left, bottom, right. Returns `None` when bottom/right lie above/left of
    /// top/left.
    fn read_rect(&mut self) -> io::Result<Option<Rect>> {
        let top = self.read_i32::<BigEndian>()?;
        let left = self.read_i32::<BigEndian>()?;
        let bottom = self.read_i32::<BigEndian>()?;
        let right = self.read_i32::<BigEndian>()?;
        Ok(Rect::from_edges(top, left, bottom, right))
    }
}

impl<R: Read + ?Sized> PsdReadExt for R {}
