//! Fixed-layout records carried in message payloads
//!
//! All multi-byte fields are big-endian. Records are appended to a payload
//! whole or not at all.

use crate::protocol::error::ProtocolError;
use heapless::Vec;

/// Kind of entity exposed to the gateway
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    Sensor = 0,
    BinarySensor = 1,
    Cover = 2,
}

impl ComponentType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Sensor),
            1 => Some(Self::BinarySensor),
            2 => Some(Self::Cover),
            _ => None,
        }
    }
}

/// Shape of a numeric value: width, signedness and decimal precision.
///
/// Packed as `[signed: 1][size_code: 3][precision: 4]` where `size_code` is
/// log2 of the byte width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueType {
    /// Width in bytes: 1, 2 or 4
    pub size: u8,
    pub signed: bool,
    /// Decimal places the gateway should apply
    pub precision: u8,
}

impl ValueType {
    pub const fn new(size: u8, signed: bool, precision: u8) -> Self {
        Self {
            size,
            signed,
            precision,
        }
    }

    pub fn to_byte(self) -> u8 {
        let size_code = match self.size {
            1 => 0,
            2 => 1,
            _ => 2,
        };
        let sign = if self.signed { 0x80 } else { 0x00 };
        sign | (size_code << 4) | (self.precision & 0x0F)
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        let size = match (byte >> 4) & 0x07 {
            0 => 1,
            1 => 2,
            2 => 4,
            _ => return None,
        };

        Some(Self {
            size,
            signed: byte & 0x80 != 0,
            precision: byte & 0x0F,
        })
    }
}

/// A record with a fixed wire size
pub trait WireRecord: Sized {
    const LEN: usize;

    /// Write exactly `LEN` bytes into `out`
    fn encode(&self, out: &mut [u8]);

    fn decode(reader: &mut Reader<'_>) -> Result<Self, ProtocolError>;
}

/// Append a record to a payload, leaving it untouched when full.
pub fn append_record<R: WireRecord, const N: usize>(
    payload: &mut Vec<u8, N>,
    record: &R,
) -> Result<(), ProtocolError> {
    if payload.capacity() - payload.len() < R::LEN {
        return Err(ProtocolError::PayloadFull);
    }

    let mut buf = [0u8; 8];
    record.encode(&mut buf[..R::LEN]);
    payload
        .extend_from_slice(&buf[..R::LEN])
        .map_err(|_| ProtocolError::PayloadFull)
}

/// Bounds-checked big-endian reader over a payload
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(ProtocolError::MalformedPayload)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + 4)
            .ok_or(ProtocolError::MalformedPayload)?;
        self.pos += 4;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read<R: WireRecord>(&mut self) -> Result<R, ProtocolError> {
        R::decode(self)
    }
}

/// Discovery description of one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub entity_id: u8,
    pub component: ComponentType,
    pub device_class: u8,
    pub unit: u8,
    pub value_type: ValueType,
}

impl WireRecord for EntityDescriptor {
    const LEN: usize = 5;

    fn encode(&self, out: &mut [u8]) {
        out[0] = self.entity_id;
        out[1] = self.component as u8;
        out[2] = self.device_class;
        out[3] = self.unit;
        out[4] = self.value_type.to_byte();
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let entity_id = reader.read_u8()?;
        let component =
            ComponentType::from_byte(reader.read_u8()?).ok_or(ProtocolError::MalformedPayload)?;
        let device_class = reader.read_u8()?;
        let unit = reader.read_u8()?;
        let value_type =
            ValueType::from_byte(reader.read_u8()?).ok_or(ProtocolError::MalformedPayload)?;

        Ok(Self {
            entity_id,
            component,
            device_class,
            unit,
            value_type,
        })
    }
}

/// Discovery description of one config parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigDescriptor {
    pub config_id: u8,
    pub unit: u8,
    pub value_type: ValueType,
}

impl WireRecord for ConfigDescriptor {
    const LEN: usize = 3;

    fn encode(&self, out: &mut [u8]) {
        out[0] = self.config_id;
        out[1] = self.unit;
        out[2] = self.value_type.to_byte();
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let config_id = reader.read_u8()?;
        let unit = reader.read_u8()?;
        let value_type =
            ValueType::from_byte(reader.read_u8()?).ok_or(ProtocolError::MalformedPayload)?;

        Ok(Self {
            config_id,
            unit,
            value_type,
        })
    }
}

/// Current reading of one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueItem {
    pub entity_id: u8,
    /// Raw value, sign-extended to 32 bits for signed entities
    pub value: u32,
}

impl WireRecord for ValueItem {
    const LEN: usize = 5;

    fn encode(&self, out: &mut [u8]) {
        out[0] = self.entity_id;
        out[1..5].copy_from_slice(&self.value.to_be_bytes());
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            entity_id: reader.read_u8()?,
            value: reader.read_u32()?,
        })
    }
}

/// Value of one config parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigItem {
    pub config_id: u8,
    /// Raw value, sign-extended to 32 bits for signed parameters
    pub value: u32,
}

impl WireRecord for ConfigItem {
    const LEN: usize = 5;

    fn encode(&self, out: &mut [u8]) {
        out[0] = self.config_id;
        out[1..5].copy_from_slice(&self.value.to_be_bytes());
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            config_id: reader.read_u8()?,
            value: reader.read_u32()?,
        })
    }
}
