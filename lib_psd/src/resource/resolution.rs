use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use super::{ImageResource, ResourceError};
use crate::constants::RESOURCE_ID_RESOLUTION_INFO;

const RESOLUTION_INFO_LENGTH: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionUnit {
    #[default]
    PxPerInch = 1,
    PxPerCm = 2,
}

impl TryFrom<i32> for ResolutionUnit {
    type Error = ResourceError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ResolutionUnit::PxPerInch),
            2 => Ok(ResolutionUnit::PxPerCm),
            other => Err(ResourceError::InvalidResolutionUnit(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeUnit {
    #[default]
    Inch = 1,
    Cm = 2,
    Point = 3,
    Pica = 4,
    Column = 5,
}

impl TryFrom<i16> for SizeUnit {
    type Error = ResourceError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SizeUnit::Inch),
            2 => Ok(SizeUnit::Cm),
            3 => Ok(SizeUnit::Point),
            4 => Ok(SizeUnit::Pica),
            5 => Ok(SizeUnit::Column),
            other => Err(ResourceError::InvalidSizeUnit(other)),
        }
    }
}

/// Payload of resource 1005: print resolution per axis and the units it is shown in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolutionInfo {
    pub h_res: i16,
    pub h_res_unit: ResolutionUnit,
    pub width_unit: SizeUnit,
    pub v_res: i16,
    pub v_res_unit: ResolutionUnit,
    pub height_unit: SizeUnit,
}

impl ResolutionInfo {
    pub fn decode(data: &[u8]) -> Result<Self, ResourceError> {
        if data.len() != RESOLUTION_INFO_LENGTH {
            return Err(ResourceError::WrongLength {
                expected: RESOLUTION_INFO_LENGTH,
                actual: data.len(),
            });
        }

        let mut reader = Cursor::new(data);
        Ok(Self {
            h_res: reader.read_i16::<BigEndian>()?,
            h_res_unit: reader.read_i32::<BigEndian>()?.try_into()?,
            width_unit: reader.read_i16::<BigEndian>()?.try_into()?,
            v_res: reader.read_i16::<BigEndian>()?,
            v_res_unit: reader.read_i32::<BigEndian>()?.try_into()?,
            height_unit: reader.read_i16::<BigEndian>()?.try_into()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RESOLUTION_INFO_LENGTH);
        for (res, res_unit, size_unit) in [
            (self.h_res, self.h_res_unit, self.width_unit),
            (self.v_res, self.v_res_unit, self.height_unit),
        ] {
            out.extend_from_slice(&res.to_be_bytes());
            out.extend_from_slice(&(res_unit as i32).to_be_bytes());
            out.extend_from_slice(&(size_unit as i16).to_be_bytes());
        }
        out
    }

    pub fn from_resource(resource: &ImageResource) -> Result<Self, ResourceError> {
        if resource.id != RESOURCE_ID_RESOLUTION_INFO {
            return Err(ResourceError::WrongId {
                expected: RESOURCE_ID_RESOLUTION_INFO,
                found: resource.id,
            });
        }
        Self::decode(&resource.data)
    }

    pub fn to_resource(&self) -> ImageResource {
        ImageResource::new(RESOURCE_ID_RESOLUTION_INFO, self.encode())
    }
}
