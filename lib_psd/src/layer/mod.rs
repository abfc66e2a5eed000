pub mod decoder;
pub mod encoder;
pub mod format;
pub mod pixels;

pub use decoder::{decode_layer_header, DecodeError};
pub use encoder::{encode_layer_header, EncodingError};
pub use pixels::{decode_channel_pixels, encode_channel_pixels};
