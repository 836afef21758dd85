//! Packet header and message types
//!
//! # Wire Format
//!
//! ```text
//! [dst: u8][src: u8][id: u8][flags: u8][len: u8][payload: [u8; len]]
//! ```
//!
//! Flags byte:
//!
//! | Bits | Meaning                       |
//! |------|-------------------------------|
//! | 7    | ack response                  |
//! | 6    | ack request                   |
//! | 5..4 | reserved, sent as zero        |
//! | 3..0 | message type (0-9 defined)    |

use crate::config::protocol::HEADER_SIZE;
use crate::protocol::error::ProtocolError;

/// Flag bits of the header
pub mod flags {
    pub const ACK_RESPONSE: u8 = 0x80;
    pub const ACK_REQUEST: u8 = 0x40;
    pub const TYPE_MASK: u8 = 0x0F;
}

/// Message types carried in the low nibble of the flags byte
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Gateway asks for a ping reply (empty payload)
    PingReq = 0,
    /// Ping reply: `[rssi: i8]`
    PingMsg = 1,
    /// `[entity_id: u8]`, 255 = all
    DiscoveryReq = 2,
    /// Entity and config descriptors
    DiscoveryMsg = 3,
    /// `[entity_id: u8]`, 255 = all
    ValueReq = 4,
    /// `[count: u8]` then `{entity_id: u8, value: u32 BE}`
    ValueMsg = 5,
    /// `[entity_id: u8]`, 255 = all
    ConfigReq = 6,
    /// `[entity_id: u8][count: u8]` then `{config_id: u8, value: u32 BE}`
    ConfigMsg = 7,
    /// Same layout as [`MessageType::ConfigMsg`]
    ConfigSetReq = 8,
    /// `[entity_id: u8][service_code: u8]`
    ServiceReq = 9,
}

impl MessageType {
    /// Try to convert a type nibble to a MessageType
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::PingReq),
            1 => Some(Self::PingMsg),
            2 => Some(Self::DiscoveryReq),
            3 => Some(Self::DiscoveryMsg),
            4 => Some(Self::ValueReq),
            5 => Some(Self::ValueMsg),
            6 => Some(Self::ConfigReq),
            7 => Some(Self::ConfigMsg),
            8 => Some(Self::ConfigSetReq),
            9 => Some(Self::ServiceReq),
            _ => None,
        }
    }
}

/// Fixed five byte packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub dst: u8,
    pub src: u8,
    pub id: u8,
    pub flags: u8,
    pub len: u8,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        [self.dst, self.src, self.id, self.flags, self.len]
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::Truncated);
        }

        Ok(Self {
            dst: data[0],
            src: data[1],
            id: data[2],
            flags: data[3],
            len: data[4],
        })
    }

    pub fn message_type(&self) -> Result<MessageType, ProtocolError> {
        let nibble = self.flags & flags::TYPE_MASK;
        MessageType::from_byte(nibble).ok_or(ProtocolError::UnknownMessageType(nibble))
    }

    pub fn is_ack_request(&self) -> bool {
        self.flags & flags::ACK_REQUEST != 0
    }

    pub fn is_ack_response(&self) -> bool {
        self.flags & flags::ACK_RESPONSE != 0
    }

    /// Acknowledgment for this header: same id, addresses swapped.
    pub fn ack(&self, own_address: u8) -> Self {
        Self {
            dst: self.src,
            src: own_address,
            id: self.id,
            flags: flags::ACK_RESPONSE | (self.flags & flags::TYPE_MASK),
            len: 0,
        }
    }
}
