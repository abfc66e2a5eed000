//! Image resource blocks: "8BIM", a `u16` id, a Pascal name and a length-prefixed payload
//! padded to an even size.

pub mod resolution;

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::SIGNATURE_8BIM;
use crate::stream::{write_length_prefixed, PsdReadExt, PsdWriteExt};

pub use resolution::{ResolutionInfo, ResolutionUnit, SizeUnit};

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("I/O error while reading image resource: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid image resource signature {0:?}, expected \"8BIM\"")]
    InvalidSignature([u8; 4]),
    #[error("Expected resource id {expected}, found {found}")]
    WrongId { expected: u16, found: u16 },
    #[error("Resource payload is {actual} bytes, expected {expected}")]
    WrongLength { expected: usize, actual: usize },
    #[error("Unknown resolution unit {0}")]
    InvalidResolutionUnit(i32),
    #[error("Unknown size unit {0}")]
    InvalidSizeUnit(i16),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResource {
    pub id: u16,
    pub name: String,
    pub data: Vec<u8>,
}

impl ImageResource {
    pub fn new(id: u16, data: Vec<u8>) -> Self {
        Self {
            id,
            name: String::new(),
            data,
        }
    }

    /// Reads one resource block, including the pad byte after an odd-sized payload.
    pub fn decode<R: Read>(reader: &mut R) -> Result<Self, ResourceError> {
        let signature = reader.read_signature()?;
        if signature != SIGNATURE_8BIM {
            error!("Invalid image resource signature: {:?}", signature);
            return Err(ResourceError::InvalidSignature(signature));
        }

        let id = reader.read_u16::<BigEndian>()?;
        let name = reader.read_pascal_string()?;
        let length = reader.read_u32::<BigEndian>()? as usize;
        let data = reader.read_bytes(length)?;
        if length % 2 == 1 {
            reader.read_u8()?;
        }

        debug!("Image resource {:#06x} {:?}: {} bytes", id, name, length);
        Ok(Self { id, name, data })
    }

    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<(), ResourceError> {
        writer.write_signature(&SIGNATURE_8BIM)?;
        writer.write_u16::<BigEndian>(self.id)?;
        writer.write_pascal_string(&self.name)?;
        let length = write_length_prefixed(writer, |body| body.write_all(&self.data))?;
        if length % 2 == 1 {
            writer.write_u8(0)?;
        }
        Ok(())
    }
}
