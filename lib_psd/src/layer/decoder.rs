use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, error, info, warn};
use thiserror::Error;

use super::format::{
    AdjustmentLayerInfo, BlendModeKey, BlendingRanges, Channel, ChannelList, LayerError,
    LayerRecord, Mask,
};
use crate::compression::{validate_depth, DepthError, ImageCompression, RleDecodeError};
use crate::constants::{MASK_BLOCK_LENGTH_WITH_REAL_MASK, SIGNATURE_8BIM};
use crate::stream::PsdReadExt;

/// Rect, default color and flags: the part of a mask block every version carries.
const MASK_BLOCK_MIN_LENGTH: u32 = 18;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("I/O error while decoding layer data: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid signature {found:?} in {section}, expected \"8BIM\"")]
    InvalidSignature {
        section: &'static str,
        found: [u8; 4],
    },
    #[error("Rectangle of the {0} has a negative size")]
    InvalidRect(&'static str),
    #[error("Channel {id} declares a negative length {length}")]
    InvalidChannelLength { id: i16, length: i32 },
    #[error("Mask block of {0} bytes is too short")]
    InvalidMaskLength(u32),
    #[error("Adjustment info {key:?} of {length} bytes runs past the end of the extra data")]
    AdjustmentOverflow { key: [u8; 4], length: u32 },
    #[error("Channel {id} payload is shorter than its compression tag")]
    MissingCompressionTag { id: i16 },
    #[error("Unsupported compression tag {tag} on channel {id}")]
    UnsupportedCompression { id: i16, tag: u16 },
    #[error("Channel {id} covers {width}x{height} pixels, more than its payload or memory can hold")]
    ImageTooLarge { id: i16, width: usize, height: usize },
    #[error("RLE row {row} of channel {id} declares {declared} bytes past the end of the data")]
    RowOutOfBounds { id: i16, row: usize, declared: usize },
    #[error("RLE row {row} of channel {id} is corrupt")]
    CorruptRow {
        id: i16,
        row: usize,
        #[source]
        source: RleDecodeError,
    },
    #[error("Invalid layer data")]
    Layer(#[from] LayerError),
    #[error("Invalid bit depth")]
    Depth(#[from] DepthError),
}

/// Decodes one layer record, leaving `reader` right after its extra data.
///
/// Pixel data is not part of the record; see [`LayerRecord::decode_pixel_data`].
/// `depth` is the bit depth of the document and is checked up front.
pub fn decode_layer_header<R: Read + Seek>(
    reader: &mut R,
    depth: u16,
) -> Result<LayerRecord, DecodeError> {
    validate_depth(depth)?;
    debug!("Layer record started at {}", reader.stream_position()?);

    let rect = reader.read_rect()?.ok_or_else(|| {
        error!("Layer rectangle has a negative size");
        DecodeError::InvalidRect("layer")
    })?;
    debug!("Layer rect: {:?}", rect);

    // Channel headers
    let channel_count = reader.read_u16::<BigEndian>()?;
    let mut channels = ChannelList::new();
    for _ in 0..channel_count {
        let id = reader.read_i16::<BigEndian>()?;
        let length = reader.read_i32::<BigEndian>()?;
        let length = u32::try_from(length).map_err(|_| {
            error!("Channel {} declares negative length {}", id, length);
            DecodeError::InvalidChannelLength { id, length }
        })?;

        let mut channel = Channel::new(id, ImageCompression::Raw);
        channel.length = length;
        channels.push(channel)?;
    }
    debug!("Read {} channel headers", channel_count);

    // Blending
    expect_signature(reader, "layer blend data")?;
    let blend_mode_key = BlendModeKey::from_bytes(reader.read_signature()?);
    let opacity = reader.read_u8()?;
    let clipping = reader.read_u8()? > 0;
    let flags = reader.read_u8()?;
    let _filler = reader.read_u8()?;
    debug!(
        "Blend mode {} opacity {} clipping {} flags {:#04b}",
        blend_mode_key, opacity, clipping, flags
    );

    // Mask, blending ranges, name and adjustment info all live inside the extra data
    let extra_data_size = reader.read_u32::<BigEndian>()?;
    let extra_start = reader.stream_position()?;
    let extra_end = extra_start + u64::from(extra_data_size);
    debug!(
        "Extra data from {} to {} ({} bytes)",
        extra_start, extra_end, extra_data_size
    );

    let mask = decode_mask(reader)?;
    let blending_ranges = decode_blending_ranges(reader)?;
    let name = decode_name(reader)?;
    let adjustment_info = decode_adjustment_info(reader, extra_end)?;

    // Whatever the entries above consumed, the record ends here.
    reader.seek(SeekFrom::Start(extra_end))?;

    let mut layer = LayerRecord {
        rect,
        channels,
        blend_mode_key,
        opacity,
        clipping,
        name,
        mask,
        blending_ranges,
        adjustment_info,
        ..Default::default()
    };
    layer.set_flags(flags);

    info!(
        "Decoded layer {:?} with {} channels and {} adjustment blocks",
        layer.name,
        layer.channels.len(),
        layer.adjustment_info.len()
    );
    Ok(layer)
}

fn expect_signature<R: Read>(reader: &mut R, section: &'static str) -> Result<(), DecodeError> {
    let found = reader.read_signature()?;
    if found != SIGNATURE_8BIM {
        error!("Invalid signature {:?} in {}", found, section);
        return Err(DecodeError::InvalidSignature { section, found });
    }
    Ok(())
}

fn decode_mask<R: Read + Seek>(reader: &mut R) -> Result<Option<Mask>, DecodeError> {
    let length = reader.read_u32::<BigEndian>()?;
    if length == 0 {
        debug!("Layer has no mask");
        return Ok(None);
    }
    if length < MASK_BLOCK_MIN_LENGTH {
        error!("Mask block of {} bytes is too short", length);
        return Err(DecodeError::InvalidMaskLength(length));
    }

    let start = reader.stream_position()?;
    debug!("Mask block of {} bytes started at {}", length, start);

    let rect = reader
        .read_rect()?
        .ok_or(DecodeError::InvalidRect("mask"))?;
    let mut mask = Mask::new(rect, reader.read_u8()?);
    mask.set_flags(reader.read_u8()?);

    if length == MASK_BLOCK_LENGTH_WITH_REAL_MASK {
        // Real user mask flags, background and rect. Only parsed to stay in step.
        let _real_flags = reader.read_u8()?;
        let _real_background = reader.read_u8()?;
        let _real_rect = reader.read_rect()?;
    }

    // There may be more we don't understand; skip to the end of the block.
    reader.seek(SeekFrom::Start(start + u64::from(length)))?;
    Ok(Some(mask))
}

fn decode_blending_ranges<R: Read + Seek>(
    reader: &mut R,
) -> Result<Option<BlendingRanges>, DecodeError> {
    let length = reader.read_u32::<BigEndian>()?;
    debug!(
        "Blending ranges of {} bytes at {}",
        length,
        reader.stream_position()?
    );
    if length == 0 {
        return Ok(None);
    }
    let data = reader.read_bytes(length as usize)?;
    Ok(Some(BlendingRanges { data }))
}

/// Layer names are Pascal strings padded to a multiple of 4 bytes, counted from the start of
/// the name.
fn decode_name<R: Read + Seek>(reader: &mut R) -> Result<String, DecodeError> {
    let name_start = reader.stream_position()?;
    let name = reader.read_pascal_string()?;
    let consumed = reader.stream_position()? - name_start;

    let padding = (4 - consumed % 4) % 4;
    debug!("Layer name {:?}, {} padding bytes", name, padding);
    reader.read_bytes(padding as usize)?;
    Ok(name)
}

/// Reads adjustment info blocks until `end`. A block that fails to parse ends the list;
/// the blocks before it are kept.
fn decode_adjustment_info<R: Read + Seek>(
    reader: &mut R,
    end: u64,
) -> Result<Vec<AdjustmentLayerInfo>, DecodeError> {
    let mut infos = Vec::new();

    loop {
        let position = reader.stream_position()?;
        if position >= end {
            break;
        }

        match decode_adjustment_entry(reader, end) {
            Ok(info) => {
                debug!(
                    "Adjustment info {:?} of {} bytes at {}",
                    info.key_str(),
                    info.data.len(),
                    position
                );
                infos.push(info);
            }
            Err(e) => {
                warn!(
                    "Discarding adjustment info at {} and everything up to {}: {}",
                    position, end, e
                );
                reader.seek(SeekFrom::Start(end))?;
                break;
            }
        }
    }

    Ok(infos)
}

fn decode_adjustment_entry<R: Read + Seek>(
    reader: &mut R,
    end: u64,
) -> Result<AdjustmentLayerInfo, DecodeError> {
    expect_signature(reader, "adjustment info")?;
    let key = reader.read_signature()?;
    let length = reader.read_u32::<BigEndian>()?;

    if reader.stream_position()? + u64::from(length) > end {
        return Err(DecodeError::AdjustmentOverflow { key, length });
    }

    let data = reader.read_bytes(length as usize)?;
    Ok(AdjustmentLayerInfo { key, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::format::Rect;
    use std::io::Cursor;

    fn be32(v: i32) -> [u8; 4] {
        v.to_be_bytes()
    }

    /// Rect 0,0,2,3, one channel, no mask or ranges, name "ab", then `extra_tail`.
    fn minimal_record(extra_tail: &[u8]) -> Vec<u8> {
        record_with_mask(&0u32.to_be_bytes(), extra_tail)
    }

    /// Mask block of `length` bytes: rect 1,2 to 3,5, color 7, invert on blend, then whatever
    /// `rest` holds, zero-filled up to `length`.
    fn mask_block(length: u32, rest: &[u8]) -> Vec<u8> {
        let mut block = length.to_be_bytes().to_vec();
        for v in [1, 2, 3, 5] {
            block.extend_from_slice(&be32(v));
        }
        block.extend_from_slice(&[7, 0b100]);
        block.extend_from_slice(rest);
        block.resize(4 + length as usize, 0);
        block
    }

    fn record_with_mask(mask: &[u8], extra_tail: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        for v in [0, 0, 2, 3] {
            data.extend_from_slice(&be32(v));
        }
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&0i16.to_be_bytes());
        data.extend_from_slice(&be32(8));
        data.extend_from_slice(b"8BIMnorm");
        data.extend_from_slice(&[200, 1, 0b10, 0]);

        let mut extra = Vec::new();
        extra.extend_from_slice(mask);
        extra.extend_from_slice(&0u32.to_be_bytes()); // blending ranges
        extra.extend_from_slice(&[2, b'a', b'b', 0]); // name, already 4-aligned
        extra.extend_from_slice(extra_tail);

        data.extend_from_slice(&(extra.len() as u32).to_be_bytes());
        data.extend_from_slice(&extra);
        data
    }

    #[test]
    fn test_decode_minimal_record() {
        let data = minimal_record(&[]);
        let mut cursor = Cursor::new(&data);
        let layer = decode_layer_header(&mut cursor, 8).unwrap();

        assert_eq!(layer.rect.height, 2);
        assert_eq!(layer.rect.width, 3);
        assert_eq!(layer.channels.get(0).map(|c| c.length), Some(8));
        assert_eq!(layer.opacity, 200);
        assert!(layer.clipping);
        assert!(!layer.visible);
        assert_eq!(layer.name, "ab");
        assert!(layer.mask.is_none());
        assert!(layer.blending_ranges.is_none());
        assert_eq!(cursor.position() as usize, data.len());
    }

    #[test]
    fn test_bad_blend_signature_is_fatal() {
        let mut data = minimal_record(&[]);
        data[24..28].copy_from_slice(b"8BPS");
        let err = decode_layer_header(&mut Cursor::new(&data), 8).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidSignature {
                found: [b'8', b'B', b'P', b'S'],
                ..
            }
        ));
    }

    #[test]
    fn test_unsupported_depth() {
        let data = minimal_record(&[]);
        let err = decode_layer_header(&mut Cursor::new(&data), 12).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Depth(DepthError::UnsupportedDepth(12))
        ));
    }

    #[test]
    fn test_duplicate_channel_ids() {
        let mut data = Vec::new();
        for v in [0, 0, 1, 1] {
            data.extend_from_slice(&be32(v));
        }
        data.extend_from_slice(&2u16.to_be_bytes());
        for _ in 0..2 {
            data.extend_from_slice(&0i16.to_be_bytes());
            data.extend_from_slice(&be32(2));
        }
        let err = decode_layer_header(&mut Cursor::new(&data), 8).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Layer(LayerError::DuplicateChannel(0))
        ));
    }

    #[test]
    fn test_truncated_record_is_io_error() {
        let data = minimal_record(&[]);
        let err = decode_layer_header(&mut Cursor::new(&data[..30]), 8).unwrap_err();
        assert!(matches!(err, DecodeError::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_adjustment_overflow_is_recovered() {
        let mut tail = Vec::new();
        tail.extend_from_slice(b"8BIMluni");
        tail.extend_from_slice(&100u32.to_be_bytes());
        tail.extend_from_slice(&[1, 2, 3, 4]);
        let data = minimal_record(&tail);

        let mut cursor = Cursor::new(&data);
        let layer = decode_layer_header(&mut cursor, 8).unwrap();
        assert!(layer.adjustment_info.is_empty());
        assert_eq!(cursor.position() as usize, data.len());
    }

    fn assert_mask_decoded(data: &[u8]) {
        let mut cursor = Cursor::new(data);
        let layer = decode_layer_header(&mut cursor, 8).unwrap();

        let mask = layer.mask.unwrap();
        assert_eq!(mask.rect, Rect::new(1, 2, 2, 3));
        assert_eq!(mask.default_color, 7);
        assert!(mask.invert_on_blend);
        assert!(!mask.disabled);
        assert!(!mask.position_is_relative);
        assert_eq!(layer.name, "ab");
        assert_eq!(cursor.position() as usize, data.len());
    }

    #[test]
    fn test_mask_with_real_user_mask_record() {
        // real mask flags, background, then a rect the decoder only steps over
        let mut real = vec![0b1, 255];
        for v in [9, 9, 0, 0] {
            real.extend_from_slice(&be32(v));
        }
        let block = mask_block(MASK_BLOCK_LENGTH_WITH_REAL_MASK, &real);
        assert_eq!(block.len(), 40);
        assert_mask_decoded(&record_with_mask(&block, &[]));
    }

    #[test]
    fn test_mask_trailing_bytes_are_skipped() {
        let block = mask_block(28, &[0xAB; 10]);
        assert_mask_decoded(&record_with_mask(&block, &[]));

        let block = mask_block(20, &[]);
        assert_mask_decoded(&record_with_mask(&block, &[]));
    }

    #[test]
    fn test_mask_block_too_short() {
        for length in 1..MASK_BLOCK_MIN_LENGTH {
            let mut block = length.to_be_bytes().to_vec();
            block.resize(4 + length as usize, 0);
            let err = decode_layer_header(&mut Cursor::new(record_with_mask(&block, &[])), 8)
                .unwrap_err();
            assert!(
                matches!(err, DecodeError::InvalidMaskLength(l) if l == length),
                "length {length}: {err}"
            );
        }
    }
}
