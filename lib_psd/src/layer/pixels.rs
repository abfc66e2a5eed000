//! Channel pixel payloads: a `u16` compression tag followed by raw rows, or by a table of
//! RLE row lengths and the PackBits-encoded rows.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, error, warn};

use super::decoder::DecodeError;
use super::encoder::EncodingError;
use super::format::{Channel, LayerRecord, Rect};
use crate::compression::rle::MAX_EXPANSION;
use crate::compression::{bytes_per_row, decode_row, encode_row, ImageCompression, RleDecodeError};
use crate::constants::{COMPRESSION_TAG_SIZE, ROW_LENGTH_PLACEHOLDER};
use crate::options::DecodeOptions;
use crate::stream::PsdReadExt;

/// Reads the payload of `channel` and decodes it into `channel.image_data`.
///
/// `depth` and `rect` describe the pixels the channel covers: the document bit depth, and the
/// layer rect (or the mask rect for the user mask channel). The decoded size is checked against
/// the payload before anything is allocated for it.
pub fn decode_channel_pixels<R: Read>(
    channel: &mut Channel,
    reader: &mut R,
    depth: u16,
    rect: Rect,
    options: &DecodeOptions,
) -> Result<(), DecodeError> {
    let id = channel.id();
    let payload = reader.read_bytes(channel.length as usize)?;
    if payload.len() < COMPRESSION_TAG_SIZE {
        return Err(DecodeError::MissingCompressionTag { id });
    }

    let mut payload = Cursor::new(payload);
    let tag = payload.read_u16::<BigEndian>()?;

    let (width, height) = rect.size();
    let row_bytes = bytes_per_row(depth, width)?;
    let size = height
        .checked_mul(row_bytes)
        .ok_or_else(|| image_too_large(id, width, height))?;

    let image_data = match ImageCompression::from_tag(tag) {
        Some(ImageCompression::Raw) => {
            let available = remaining(&payload);
            if available < size {
                error!(
                    "Channel {} has {} bytes of raw data, {} needed",
                    id, available, size
                );
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
            let mut image_data =
                pixel_buffer(size).ok_or_else(|| image_too_large(id, width, height))?;
            payload.read_exact(&mut image_data)?;
            channel.compression = ImageCompression::Raw;
            image_data
        }
        Some(ImageCompression::Rle) => {
            let image_data =
                decode_rle_rows(&mut payload, id, (width, height), row_bytes, options)?;
            channel.compression = ImageCompression::Rle;
            image_data
        }
        None if options.allow_unknown_compression => {
            warn!(
                "Channel {} uses unknown compression {}; leaving its pixels blank",
                id, tag
            );
            channel.compression = ImageCompression::Raw;
            pixel_buffer(size).ok_or_else(|| image_too_large(id, width, height))?
        }
        None => return Err(DecodeError::UnsupportedCompression { id, tag }),
    };

    debug!(
        "Channel {}: {} bytes of {:?} data decoded to {}x{} at depth {}",
        id, channel.length, channel.compression, width, height, depth
    );

    let mut payload = payload.into_inner();
    payload.drain(..COMPRESSION_TAG_SIZE);
    channel.data = payload;
    channel.image_data = image_data;
    Ok(())
}

fn image_too_large(id: i16, width: usize, height: usize) -> DecodeError {
    error!("Channel {} of {}x{} pixels cannot be decoded", id, width, height);
    DecodeError::ImageTooLarge { id, width, height }
}

fn remaining(payload: &Cursor<Vec<u8>>) -> usize {
    payload
        .get_ref()
        .len()
        .saturating_sub(payload.position() as usize)
}

/// A zero-filled buffer of `size` bytes, or `None` if it cannot be allocated.
fn pixel_buffer(size: usize) -> Option<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(size).ok()?;
    buffer.resize(size, 0);
    Some(buffer)
}

fn decode_rle_rows(
    payload: &mut Cursor<Vec<u8>>,
    id: i16,
    (width, height): (usize, usize),
    row_bytes: usize,
    options: &DecodeOptions,
) -> Result<Vec<u8>, DecodeError> {
    let available = remaining(payload);
    let table_size = height
        .checked_mul(2)
        .filter(|&table_size| table_size <= available)
        .ok_or_else(|| {
            error!(
                "Channel {} is too short for a table of {} RLE rows",
                id, height
            );
            io::Error::from(io::ErrorKind::UnexpectedEof)
        })?;

    let row_lengths = (0..height)
        .map(|_| payload.read_u16::<BigEndian>().map(usize::from))
        .collect::<io::Result<Vec<_>>>()?;

    // Every row has to come out of what is left, so the rect is bounded by the data.
    let encoded = remaining(payload);
    let size = height * row_bytes;
    if size > encoded.saturating_mul(MAX_EXPANSION) {
        return Err(image_too_large(id, width, height));
    }
    let mut image_data = pixel_buffer(size).ok_or_else(|| image_too_large(id, width, height))?;

    let mut position = COMPRESSION_TAG_SIZE + table_size;
    let data = payload.get_ref().as_slice();

    for (row, &declared) in row_lengths.iter().enumerate() {
        let dst = &mut image_data[row * row_bytes..(row + 1) * row_bytes];
        let corrupt = |source: RleDecodeError| DecodeError::CorruptRow { id, row, source };

        if options.strict_row_lengths {
            let src = data
                .get(position..position + declared)
                .ok_or(DecodeError::RowOutOfBounds { id, row, declared })?;
            decode_row(src, dst).map_err(corrupt)?;
            position += declared;
        } else {
            let src = data.get(position..).unwrap_or_default();
            position += decode_row(src, dst).map_err(corrupt)?;
        }
    }

    payload.set_position(position as u64);
    Ok(image_data)
}

/// Writes the payload of `channel`: its compression tag and compressed data.
pub fn encode_channel_pixels<W: Write>(
    channel: &Channel,
    writer: &mut W,
) -> Result<(), EncodingError> {
    writer.write_u16::<BigEndian>(channel.compression.tag())?;
    writer.write_all(&channel.data)?;
    Ok(())
}

impl Channel {
    /// Compresses `image_data` into `data` and updates `length` to match.
    pub fn compress(&mut self, depth: u16, rect: Rect) -> Result<(), EncodingError> {
        let (width, height) = rect.size();
        let row_bytes = bytes_per_row(depth, width)?;
        let expected = height * row_bytes;
        if self.image_data.len() != expected {
            return Err(EncodingError::ImageDataSize {
                id: self.id(),
                expected,
                actual: self.image_data.len(),
            });
        }

        self.data = match self.compression {
            ImageCompression::Raw => self.image_data.clone(),
            ImageCompression::Rle => self.compress_rle(height, row_bytes)?,
        };

        let length = self.data.len() + COMPRESSION_TAG_SIZE;
        self.length = u32::try_from(length).map_err(|_| EncodingError::ChannelTooLarge {
            id: self.id(),
            length,
        })?;
        debug!(
            "Channel {} compressed to {} bytes ({:?})",
            self.id(),
            self.length,
            self.compression
        );
        Ok(())
    }

    fn compress_rle(&self, height: usize, row_bytes: usize) -> Result<Vec<u8>, EncodingError> {
        let mut writer = Cursor::new(Vec::with_capacity(height * 2 + self.image_data.len()));

        // we will write the correct lengths later, so reserve the table
        for _ in 0..height {
            writer.write_u16::<BigEndian>(ROW_LENGTH_PLACEHOLDER)?;
        }

        let mut row_lengths = Vec::with_capacity(height);
        let mut encoded = Vec::new();
        for row in 0..height {
            encoded.clear();
            let src = &self.image_data[row * row_bytes..(row + 1) * row_bytes];
            let length = encode_row(src, &mut encoded);
            let length = u16::try_from(length).map_err(|_| EncodingError::RowTooLong {
                id: self.id(),
                row,
                length,
            })?;
            row_lengths.push(length);
            writer.write_all(&encoded)?;
        }

        let end_position = writer.stream_position()?;
        writer.seek(SeekFrom::Start(0))?;
        for length in row_lengths {
            writer.write_u16::<BigEndian>(length)?;
        }
        writer.seek(SeekFrom::Start(end_position))?;

        Ok(writer.into_inner())
    }
}

impl LayerRecord {
    /// Reads the pixel payloads of all channels, in channel order.
    ///
    /// The user mask channel (-2) is decoded against the mask rect and copied into the mask.
    /// Without a non-empty mask its payload is skipped.
    pub fn decode_pixel_data<R: Read>(
        &mut self,
        reader: &mut R,
        depth: u16,
        options: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        let layer_rect = self.rect;
        let mask_rect = self.mask.as_ref().map(|m| m.rect).filter(|r| !r.is_empty());

        for channel in self.channels.iter_mut() {
            if !channel.is_user_mask() {
                decode_channel_pixels(channel, reader, depth, layer_rect, options)?;
                continue;
            }

            match (mask_rect, self.mask.as_mut()) {
                (Some(rect), Some(mask)) => {
                    decode_channel_pixels(channel, reader, depth, rect, options)?;
                    mask.image_data = channel.image_data.clone();
                }
                _ => {
                    warn!(
                        "Skipping {} bytes of user mask data without a mask",
                        channel.length
                    );
                    let skipped = io::copy(
                        &mut reader.by_ref().take(u64::from(channel.length)),
                        &mut io::sink(),
                    )?;
                    if skipped != u64::from(channel.length) {
                        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Compresses every channel's `image_data`, readying the record for
    /// [`encode_layer_header`](super::encode_layer_header).
    ///
    /// A user mask channel without a non-empty mask is left as it is.
    pub fn compress_pixel_data(&mut self, depth: u16) -> Result<(), EncodingError> {
        let layer_rect = self.rect;
        let mask_rect = self.mask.as_ref().map(|m| m.rect).filter(|r| !r.is_empty());

        for channel in self.channels.iter_mut() {
            match (channel.is_user_mask(), mask_rect) {
                (false, _) => channel.compress(depth, layer_rect)?,
                (true, Some(rect)) => channel.compress(depth, rect)?,
                (true, None) => {}
            }
        }
        Ok(())
    }

    /// Writes the pixel payloads of all channels, in channel order.
    pub fn encode_pixel_data<W: Write>(&self, writer: &mut W) -> Result<(), EncodingError> {
        for channel in &self.channels {
            encode_channel_pixels(channel, writer)?;
        }
        Ok(())
    }
}
