use std::io::{self, Seek, Write};

use byteorder::{BigEndian, WriteBytesExt};
use log::{debug, error, info};
use thiserror::Error;

use super::format::{AdjustmentLayerInfo, BlendingRanges, Channel, LayerRecord, Mask};
use crate::compression::DepthError;
use crate::constants::{COMPRESSION_TAG_SIZE, MASK_BLOCK_LENGTH, SIGNATURE_8BIM};
use crate::stream::{LengthWriter, PsdWriteExt};

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("I/O error while encoding layer data: {0}")]
    Io(#[from] io::Error),
    #[error("Layer has {0} channels, more than a record can hold")]
    TooManyChannels(usize),
    #[error("Channel {id} payload of {length} bytes is too large")]
    ChannelTooLarge { id: i16, length: usize },
    #[error("{section} of {length} bytes is too large")]
    BlockTooLarge { section: &'static str, length: usize },
    #[error("Channel {id} has {actual} bytes of image data, expected {expected}")]
    ImageDataSize {
        id: i16,
        expected: usize,
        actual: usize,
    },
    #[error("RLE row {row} of channel {id} encodes to {length} bytes, more than a row table entry holds")]
    RowTooLong { id: i16, row: usize, length: usize },
    #[error("Invalid bit depth")]
    Depth(#[from] DepthError),
}

/// Writes one layer record.
///
/// Channel headers declare the size of each channel's compressed payload, so the payloads
/// must already be compressed (see [`LayerRecord::compress_pixel_data`]).
pub fn encode_layer_header<W: Write + Seek>(
    layer: &LayerRecord,
    writer: &mut W,
) -> Result<(), EncodingError> {
    debug!("Layer save started at {}", writer.stream_position()?);

    writer.write_rect(&layer.rect)?;

    // Channel headers
    let channel_count = u16::try_from(layer.channels.len()).map_err(|_| {
        error!("Too many channels: {}", layer.channels.len());
        EncodingError::TooManyChannels(layer.channels.len())
    })?;
    writer.write_u16::<BigEndian>(channel_count)?;
    for channel in &layer.channels {
        writer.write_i16::<BigEndian>(channel.id())?;
        writer.write_i32::<BigEndian>(declared_length(channel)?)?;
    }

    // Blending
    writer.write_signature(&SIGNATURE_8BIM)?;
    writer.write_signature(layer.blend_mode_key.as_bytes())?;
    writer.write_u8(layer.opacity)?;
    writer.write_u8(u8::from(layer.clipping))?;
    writer.write_u8(layer.flags())?;
    writer.write_u8(0)?; // filler

    // Extra data
    let mut extra = LengthWriter::new(writer)?;
    encode_mask(layer.mask.as_ref(), &mut *extra)?;
    encode_blending_ranges(layer.blending_ranges.as_ref(), &mut *extra)?;
    encode_name(&layer.name, &mut *extra)?;
    for info in &layer.adjustment_info {
        encode_adjustment_info(info, &mut *extra)?;
    }
    let extra_data_size = extra.finish()?;

    info!(
        "Encoded layer {:?} with {} channels, {} bytes of extra data",
        layer.name,
        layer.channels.len(),
        extra_data_size
    );
    Ok(())
}

/// Length written into a channel header: the compressed payload plus its compression tag.
fn declared_length(channel: &Channel) -> Result<i32, EncodingError> {
    let length = channel.data.len() + COMPRESSION_TAG_SIZE;
    i32::try_from(length).map_err(|_| EncodingError::ChannelTooLarge {
        id: channel.id(),
        length,
    })
}

fn block_length(section: &'static str, length: usize) -> Result<u32, EncodingError> {
    u32::try_from(length).map_err(|_| EncodingError::BlockTooLarge { section, length })
}

fn encode_mask<W: Write + Seek>(mask: Option<&Mask>, writer: &mut W) -> Result<(), EncodingError> {
    let Some(mask) = mask.filter(|m| !m.rect.is_empty()) else {
        writer.write_u32::<BigEndian>(0)?;
        return Ok(());
    };

    let mut block = LengthWriter::new(writer)?;
    block.write_rect(&mask.rect)?;
    block.write_u8(mask.default_color)?;
    block.write_u8(mask.flags())?;

    // pad the block out to its fixed size
    let written = block.stream_position()? - block.start_position();
    let padding = u64::from(MASK_BLOCK_LENGTH).saturating_sub(written) as usize;
    block.write_all(&[0; MASK_BLOCK_LENGTH as usize][..padding])?;
    block.finish()?;
    Ok(())
}

fn encode_blending_ranges<W: Write>(
    ranges: Option<&BlendingRanges>,
    writer: &mut W,
) -> Result<(), EncodingError> {
    let data = ranges.map(|r| r.data.as_slice()).unwrap_or_default();
    writer.write_u32::<BigEndian>(block_length("Blending ranges", data.len())?)?;
    writer.write_all(data)?;
    Ok(())
}

fn encode_name<W: Write + Seek>(name: &str, writer: &mut W) -> Result<(), EncodingError> {
    let name_start = writer.stream_position()?;
    writer.write_pascal_string(name)?;
    let consumed = writer.stream_position()? - name_start;

    let padding = ((4 - consumed % 4) % 4) as usize;
    debug!("Layer name {:?}, {} padding bytes", name, padding);
    writer.write_all(&[0; 3][..padding])?;
    Ok(())
}

fn encode_adjustment_info<W: Write>(
    info: &AdjustmentLayerInfo,
    writer: &mut W,
) -> Result<(), EncodingError> {
    writer.write_signature(&SIGNATURE_8BIM)?;
    writer.write_signature(&info.key)?;
    writer.write_u32::<BigEndian>(block_length("Adjustment info", info.data.len())?)?;
    writer.write_all(&info.data)?;
    Ok(())
}
