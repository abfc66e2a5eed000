pub mod compression;
pub mod constants;
pub mod layer;
pub mod options;
pub mod resource;
pub mod snapshot;
pub mod stream;

use log::*;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

pub use crate::layer::format::{
    AdjustmentLayerInfo, BlendModeKey, BlendingRanges, Channel, ChannelList, LayerRecord, Mask, Rect,
};
pub use crate::layer::{
    decode_channel_pixels, decode_layer_header, encode_channel_pixels, encode_layer_header,
};
pub use crate::options::DecodeOptions;
pub use crate::resource::{ImageResource, ResolutionInfo};

pub fn init_logging(path: impl AsRef<Path>) -> io::Result<()> {
    let target = Box::new(File::create(path)?);

    env_logger::Builder::new()
        .target(env_logger::Target::Pipe(target))
        .filter(Some("lib_psd"), LevelFilter::Debug)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}:{}] {}",
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))
}
