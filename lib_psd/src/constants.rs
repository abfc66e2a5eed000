/// Signature in front of layer blend data, adjustment info and image resources.
pub const SIGNATURE_8BIM: [u8; 4] = *b"8BIM";

/// Written into a length slot until the real length is known.
pub const LENGTH_PLACEHOLDER: u32 = 0xFEED_FEED;
/// Written into each RLE row-length slot until the row is encoded.
pub const ROW_LENGTH_PLACEHOLDER: u16 = 0x1234;

pub const CHANNEL_ID_TRANSPARENCY: i16 = -1;
pub const CHANNEL_ID_USER_MASK: i16 = -2;

/// Size of the mask block this crate writes: rect, default color, flags, 2 bytes of padding.
pub const MASK_BLOCK_LENGTH: u32 = 20;
/// Mask blocks of this size carry a trailing "real user mask" record.
pub const MASK_BLOCK_LENGTH_WITH_REAL_MASK: u32 = 36;

/// Size of the compression tag in front of every channel payload.
pub const COMPRESSION_TAG_SIZE: usize = 2;

pub const RESOURCE_ID_RESOLUTION_INFO: u16 = 0x03ED;

pub const DEFAULT_BLEND_MODE_KEY: [u8; 4] = *b"norm";
