//! Big-endian primitives shared by every section codec.
//!
//! Integers go through `byteorder` with [`byteorder::BigEndian`]; the traits here add the
//! PSD-specific shapes on top: Pascal strings, 4-byte signatures and rectangles.

pub mod length_writer;
pub mod reader;
pub mod writer;

pub use length_writer::{write_length_prefixed, LengthWriter};
pub use reader::PsdReadExt;
pub use writer::PsdWriteExt;

/// Decodes Latin-1 bytes, one character per byte.
pub(crate) fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encodes text as Latin-1, substituting `?` for anything outside it.
pub(crate) fn string_to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
