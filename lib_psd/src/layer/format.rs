use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::compression::ImageCompression;
use crate::constants::{CHANNEL_ID_USER_MASK, DEFAULT_BLEND_MODE_KEY};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayerError {
    #[error("Key must be exactly 4 bytes, got {0:?}")]
    InvalidKeyLength(String),
    #[error("Duplicate channel id {0}")]
    DuplicateChannel(i16),
}

/// A rectangle stored as its top-left corner and size. On disk it is written as
/// top, left, bottom, right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub top: i32,
    pub left: i32,
    pub height: i32,
    pub width: i32,
}

impl Rect {
    pub const fn new(top: i32, left: i32, height: i32, width: i32) -> Self {
        Self {
            top,
            left,
            height,
            width,
        }
    }

    /// Builds a rect from its edges, or `None` if it would have a negative size.
    pub fn from_edges(top: i32, left: i32, bottom: i32, right: i32) -> Option<Self> {
        let height = bottom.checked_sub(top).filter(|h| *h >= 0)?;
        let width = right.checked_sub(left).filter(|w| *w >= 0)?;
        Some(Self::new(top, left, height, width))
    }

    pub fn bottom(&self) -> i32 {
        self.top.saturating_add(self.height)
    }

    pub fn right(&self) -> i32 {
        self.left.saturating_add(self.width)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Width and height in pixels; negative sizes count as zero.
    pub fn size(&self) -> (usize, usize) {
        (
            usize::try_from(self.width).unwrap_or(0),
            usize::try_from(self.height).unwrap_or(0),
        )
    }
}

/// A 4-byte blend mode key such as `norm`, `mul ` or `scrn`.
///
/// Keys are stored verbatim and need not be printable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlendModeKey([u8; 4]);

impl BlendModeKey {
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl Default for BlendModeKey {
    fn default() -> Self {
        Self(DEFAULT_BLEND_MODE_KEY)
    }
}

impl TryFrom<&str> for BlendModeKey {
    type Error = LayerError;

    fn try_from(key: &str) -> Result<Self, Self::Error> {
        four_byte_key(key).map(Self)
    }
}

impl fmt::Display for BlendModeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for BlendModeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlendModeKey({:?})", String::from_utf8_lossy(&self.0))
    }
}

fn four_byte_key(key: &str) -> Result<[u8; 4], LayerError> {
    key.as_bytes()
        .try_into()
        .map_err(|_| LayerError::InvalidKeyLength(key.to_string()))
}

/// One color, alpha or mask plane of a layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    id: i16,
    pub compression: ImageCompression,
    /// Payload length as declared in the channel header, compression tag included.
    pub length: u32,
    /// Compressed payload, without the compression tag.
    pub data: Vec<u8>,
    /// Decoded pixels, row after row.
    pub image_data: Vec<u8>,
}

impl Channel {
    pub fn new(id: i16, compression: ImageCompression) -> Self {
        Self {
            id,
            compression,
            ..Default::default()
        }
    }

    pub fn with_image_data(id: i16, compression: ImageCompression, image_data: Vec<u8>) -> Self {
        Self {
            image_data,
            ..Self::new(id, compression)
        }
    }

    /// 0, 1, 2... are color components, -1 is transparency, -2 is the user mask.
    pub fn id(&self) -> i16 {
        self.id
    }

    pub fn is_user_mask(&self) -> bool {
        self.id == CHANNEL_ID_USER_MASK
    }
}

/// A layer's channels in disk order, with a lookup by channel id.
///
/// The list is authoritative; the lookup is rebuilt from it after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelList {
    list: Vec<Channel>,
    index: BTreeMap<i16, usize>,
}

impl ChannelList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(list: Vec<Channel>) -> Result<Self, LayerError> {
        let mut channels = Self {
            list,
            index: BTreeMap::new(),
        };
        channels.rebuild_index()?;
        Ok(channels)
    }

    fn rebuild_index(&mut self) -> Result<(), LayerError> {
        self.index.clear();
        for (position, channel) in self.list.iter().enumerate() {
            if self.index.insert(channel.id, position).is_some() {
                return Err(LayerError::DuplicateChannel(channel.id));
            }
        }
        Ok(())
    }

    /// Appends a channel. Ids must be unique within a layer.
    pub fn push(&mut self, channel: Channel) -> Result<(), LayerError> {
        if self.contains(channel.id) {
            return Err(LayerError::DuplicateChannel(channel.id));
        }
        self.index.insert(channel.id, self.list.len());
        self.list.push(channel);
        Ok(())
    }

    pub fn remove(&mut self, id: i16) -> Option<Channel> {
        let position = *self.index.get(&id)?;
        let channel = self.list.remove(position);
        // Ids were unique before removal, so they still are.
        let _ = self.rebuild_index();
        Some(channel)
    }

    pub fn get(&self, id: i16) -> Option<&Channel> {
        self.index.get(&id).map(|&i| &self.list[i])
    }

    pub fn get_mut(&mut self, id: i16) -> Option<&mut Channel> {
        self.index.get(&id).map(|&i| &mut self.list[i])
    }

    pub fn position(&self, id: i16) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn contains(&self, id: i16) -> bool {
        self.index.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = i16> + '_ {
        self.list.iter().map(|c| c.id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Channel> {
        self.list.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Channel> {
        self.list.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChannelList {
    type Item = &'a Channel;
    type IntoIter = std::slice::Iter<'a, Channel>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for ChannelList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.list.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChannelList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let list = Vec::<Channel>::deserialize(deserializer)?;
        ChannelList::from_vec(list).map_err(serde::de::Error::custom)
    }
}

/// The user mask attached to a layer. Its pixels travel in channel -2.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mask {
    pub rect: Rect,
    pub default_color: u8,
    pub position_is_relative: bool,
    pub disabled: bool,
    pub invert_on_blend: bool,
    pub image_data: Vec<u8>,
}

impl Mask {
    const POSITION_IS_RELATIVE: u8 = 0b001;
    const DISABLED: u8 = 0b010;
    const INVERT_ON_BLEND: u8 = 0b100;

    pub fn new(rect: Rect, default_color: u8) -> Self {
        Self {
            rect,
            default_color,
            ..Default::default()
        }
    }

    pub(crate) fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.position_is_relative {
            flags |= Self::POSITION_IS_RELATIVE;
        }
        if self.disabled {
            flags |= Self::DISABLED;
        }
        if self.invert_on_blend {
            flags |= Self::INVERT_ON_BLEND;
        }
        flags
    }

    pub(crate) fn set_flags(&mut self, flags: u8) {
        self.position_is_relative = flags & Self::POSITION_IS_RELATIVE != 0;
        self.disabled = flags & Self::DISABLED != 0;
        self.invert_on_blend = flags & Self::INVERT_ON_BLEND != 0;
    }
}

/// Blending range data, kept as opaque bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlendingRanges {
    pub data: Vec<u8>,
}

/// A tagged extension block attached to a layer. The `8BIM` signature is implied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentLayerInfo {
    pub key: [u8; 4],
    pub data: Vec<u8>,
}

impl AdjustmentLayerInfo {
    pub fn new(key: &str, data: Vec<u8>) -> Result<Self, LayerError> {
        Ok(Self {
            key: four_byte_key(key)?,
            data,
        })
    }

    pub fn key_str(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}

/// One layer record: bounds, channels, blending and the extra data that follows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub rect: Rect,
    pub channels: ChannelList,
    pub blend_mode_key: BlendModeKey,
    /// 0 = transparent ... 255 = opaque
    pub opacity: u8,
    pub clipping: bool,
    pub visible: bool,
    pub protect_transparency: bool,
    pub name: String,
    pub mask: Option<Mask>,
    /// An empty block is written as absent and so decodes as `None`;
    /// [`LayerRecord::set_blending_ranges`] stores it that way up front.
    pub blending_ranges: Option<BlendingRanges>,
    pub adjustment_info: Vec<AdjustmentLayerInfo>,
}

impl Default for LayerRecord {
    fn default() -> Self {
        Self {
            rect: Rect::default(),
            channels: ChannelList::new(),
            blend_mode_key: BlendModeKey::default(),
            opacity: 255,
            clipping: false,
            visible: true,
            protect_transparency: false,
            name: String::new(),
            mask: None,
            blending_ranges: None,
            adjustment_info: Vec::new(),
        }
    }
}

impl LayerRecord {
    const PROTECT_TRANSPARENCY: u8 = 0b01;
    const HIDDEN: u8 = 0b10;

    pub fn new(name: impl Into<String>, rect: Rect) -> Self {
        Self {
            name: name.into(),
            rect,
            ..Default::default()
        }
    }

    /// Validates and sets the blend mode key.
    pub fn set_blend_mode_key(&mut self, key: &str) -> Result<(), LayerError> {
        self.blend_mode_key = BlendModeKey::try_from(key)?;
        Ok(())
    }

    /// Stores blending range data, keeping empty data as `None`.
    pub fn set_blending_ranges(&mut self, data: Vec<u8>) {
        self.blending_ranges = (!data.is_empty()).then_some(BlendingRanges { data });
    }

    pub fn add_channel(&mut self, channel: Channel) -> Result<(), LayerError> {
        self.channels.push(channel)
    }

    /// Rect the pixels of `channel` cover: the mask rect for the user mask, else the layer rect.
    pub fn channel_rect(&self, channel: &Channel) -> Rect {
        match (&self.mask, channel.is_user_mask()) {
            (Some(mask), true) => mask.rect,
            _ => self.rect,
        }
    }

    pub(crate) fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.protect_transparency {
            flags |= Self::PROTECT_TRANSPARENCY;
        }
        if !self.visible {
            flags |= Self::HIDDEN;
        }
        flags
    }

    pub(crate) fn set_flags(&mut self, flags: u8) {
        self.protect_transparency = flags & Self::PROTECT_TRANSPARENCY != 0;
        self.visible = flags & Self::HIDDEN == 0;
    }
}
