#![allow(dead_code)]

use std::io::Cursor;

use lib_psd::compression::ImageCompression;
use lib_psd::constants::{CHANNEL_ID_TRANSPARENCY, CHANNEL_ID_USER_MASK};
use lib_psd::{encode_layer_header, AdjustmentLayerInfo, Channel, LayerRecord, Mask, Rect};

pub const DEPTH: u16 = 8;

/// 4x4 raw channel, one byte per pixel.
pub const RAW_4X4: [u8; 16] = [
    0, 1, 2, 3, //
    4, 5, 6, 7, //
    8, 9, 10, 11, //
    12, 13, 14, 15,
];

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Rows of a horizontal gradient that repeats every 8 pixels, so RLE has both runs and
/// literals to work with.
pub fn gradient(width: usize, height: usize) -> Vec<u8> {
    (0..height)
        .flat_map(|y| {
            (0..width).map(move |x| if y % 2 == 0 { (x / 8) as u8 } else { x as u8 })
        })
        .collect()
}

/// A channel payload as it appears on disk: compression tag then `data`.
pub fn channel_payload(tag: u16, data: &[u8]) -> Vec<u8> {
    let mut payload = tag.to_be_bytes().to_vec();
    payload.extend_from_slice(data);
    payload
}

/// A layer with transparency, RGB, a user mask and every optional block filled in.
pub fn full_layer() -> LayerRecord {
    let rect = Rect::new(10, 20, 6, 16);
    let (width, height) = rect.size();

    let mut layer = LayerRecord::new("Background copy é", rect);
    layer.set_blend_mode_key("mul ").unwrap();
    layer.opacity = 128;
    layer.clipping = true;
    layer.protect_transparency = true;

    layer
        .add_channel(Channel::with_image_data(
            CHANNEL_ID_TRANSPARENCY,
            ImageCompression::Rle,
            vec![255; width * height],
        ))
        .unwrap();
    for id in 0..3 {
        let compression = if id == 1 {
            ImageCompression::Raw
        } else {
            ImageCompression::Rle
        };
        layer
            .add_channel(Channel::with_image_data(id, compression, gradient(width, height)))
            .unwrap();
    }

    let mut mask = Mask::new(Rect::new(11, 21, 2, 3), 255);
    mask.disabled = true;
    mask.invert_on_blend = true;
    mask.image_data = vec![0, 0, 0, 9, 9, 9];
    layer
        .add_channel(Channel::with_image_data(
            CHANNEL_ID_USER_MASK,
            ImageCompression::Rle,
            mask.image_data.clone(),
        ))
        .unwrap();
    layer.mask = Some(mask);

    layer.set_blending_ranges(vec![0, 0, 255, 255, 0, 0, 255, 255]);
    layer.adjustment_info = vec![
        AdjustmentLayerInfo::new("luni", vec![0, 0, 0, 1, 0, b'A', 0, 0]).unwrap(),
        AdjustmentLayerInfo::new("lsct", vec![0, 0, 0, 0]).unwrap(),
    ];
    layer
}

/// Compresses the pixel data and writes the header followed by the channel payloads.
pub fn encode_layer(layer: &mut LayerRecord) -> Vec<u8> {
    layer.compress_pixel_data(DEPTH).unwrap();

    let mut cursor = Cursor::new(Vec::new());
    encode_layer_header(layer, &mut cursor).unwrap();
    layer.encode_pixel_data(&mut cursor).unwrap();
    cursor.into_inner()
}
