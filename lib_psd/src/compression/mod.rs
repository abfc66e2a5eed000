pub mod rle;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use rle::{decode_row, encode_row, RleDecodeError};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DepthError {
    #[error("Unsupported bit depth: {0}")]
    UnsupportedDepth(u16),
}

/// How a channel's pixel payload is stored. Written as a `u16` tag in front of the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageCompression {
    #[default]
    Raw,
    Rle,
}

impl ImageCompression {
    pub fn tag(self) -> u16 {
        match self {
            ImageCompression::Raw => 0,
            ImageCompression::Rle => 1,
        }
    }

    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            0 => Some(ImageCompression::Raw),
            1 => Some(ImageCompression::Rle),
            _ => None,
        }
    }
}

/// Checks that `depth` is a bit depth this crate can lay out rows for.
pub fn validate_depth(depth: u16) -> Result<(), DepthError> {
    match depth {
        1 | 8 | 16 | 32 => Ok(()),
        other => Err(DepthError::UnsupportedDepth(other)),
    }
}

/// Bytes in one row of a channel `width` pixels wide.
///
/// 1-bit data is laid out like 8-bit data, one byte per pixel.
pub fn bytes_per_row(depth: u16, width: usize) -> Result<usize, DepthError> {
    match depth {
        1 | 8 => Ok(width),
        16 => Ok(width * 2),
        32 => Ok(width * 4),
        other => Err(DepthError::UnsupportedDepth(other)),
    }
}
