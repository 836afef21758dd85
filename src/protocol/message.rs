//! Payload-level encoding and decoding of whole messages
//!
//! The node decodes requests coming from the gateway; the report decoders
//! are the gateway's view of what the node sends.

use crate::config::protocol::{MAX_CONFIG_ITEMS, MAX_PAYLOAD};
use crate::protocol::error::ProtocolError;
use crate::protocol::header::MessageType;
use crate::protocol::records::{
    append_record, ConfigDescriptor, ConfigItem, EntityDescriptor, Reader, ValueItem, WireRecord,
};
use heapless::Vec;

/// Upper bound of value items in one message
pub const MAX_VALUE_ITEMS: usize = (MAX_PAYLOAD - 1) / ValueItem::LEN;

/// Upper bound of entities in one discovery message
pub const MAX_DISCOVERY_ENTITIES: usize = MAX_PAYLOAD / (EntityDescriptor::LEN + 1);

/// Upper bound of config descriptors following one entity
pub const MAX_DISCOVERY_CONFIGS: usize = (MAX_PAYLOAD - EntityDescriptor::LEN - 1) / ConfigDescriptor::LEN;

fn push_byte<const N: usize>(out: &mut Vec<u8, N>, byte: u8) -> Result<(), ProtocolError> {
    out.push(byte).map_err(|_| ProtocolError::PayloadFull)
}

/// Callbacks for requests addressed to this node
///
/// Every method defaults to doing nothing so handlers only implement the
/// requests they care about.
pub trait RequestHandler {
    fn discovery_requested(&mut self, _entity_id: u8) {}

    fn values_requested(&mut self, _entity_id: u8) {}

    fn configs_requested(&mut self, _entity_id: u8) {}

    fn config_set(&mut self, _entity_id: u8, _items: &[ConfigItem]) {}

    fn service_requested(&mut self, _entity_id: u8, _service_code: u8) {}
}

impl RequestHandler for () {}

/// Entity id followed by a counted list of config items.
///
/// Shared by `config_msg` and `configSet_req`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigList {
    pub entity_id: u8,
    pub items: Vec<ConfigItem, MAX_CONFIG_ITEMS>,
}

impl ConfigList {
    /// Decode a config list; the payload length must match the count exactly.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = Reader::new(payload);
        let entity_id = reader.read_u8()?;
        let count = reader.read_u8()? as usize;

        if reader.remaining() != count * ConfigItem::LEN {
            return Err(ProtocolError::MalformedPayload);
        }

        let mut items = Vec::new();
        for _ in 0..count {
            items
                .push(reader.read::<ConfigItem>()?)
                .map_err(|_| ProtocolError::MalformedPayload)?;
        }

        Ok(Self { entity_id, items })
    }

    pub fn encode<const N: usize>(&self, out: &mut Vec<u8, N>) -> Result<(), ProtocolError> {
        push_byte(out, self.entity_id)?;
        push_byte(out, self.items.len() as u8)?;
        for item in &self.items {
            append_record(out, item)?;
        }
        Ok(())
    }
}

/// Request sent by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Discovery { entity_id: u8 },
    Values { entity_id: u8 },
    Configs { entity_id: u8 },
    ConfigSet(ConfigList),
    Service { entity_id: u8, service_code: u8 },
}

impl Request {
    /// Decode the payload of a request message.
    ///
    /// Returns [`ProtocolError::MalformedPayload`] for short payloads and
    /// for message types that are not requests with a payload.
    pub fn decode(message_type: MessageType, payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = Reader::new(payload);

        let request = match message_type {
            MessageType::DiscoveryReq => Self::Discovery {
                entity_id: reader.read_u8()?,
            },
            MessageType::ValueReq => Self::Values {
                entity_id: reader.read_u8()?,
            },
            MessageType::ConfigReq => Self::Configs {
                entity_id: reader.read_u8()?,
            },
            MessageType::ConfigSetReq => Self::ConfigSet(ConfigList::decode(payload)?),
            MessageType::ServiceReq => Self::Service {
                entity_id: reader.read_u8()?,
                service_code: reader.read_u8()?,
            },
            _ => return Err(ProtocolError::MalformedPayload),
        };

        Ok(request)
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Discovery { .. } => MessageType::DiscoveryReq,
            Self::Values { .. } => MessageType::ValueReq,
            Self::Configs { .. } => MessageType::ConfigReq,
            Self::ConfigSet(_) => MessageType::ConfigSetReq,
            Self::Service { .. } => MessageType::ServiceReq,
        }
    }

    pub fn encode<const N: usize>(&self, out: &mut Vec<u8, N>) -> Result<(), ProtocolError> {
        match self {
            Self::Discovery { entity_id } | Self::Values { entity_id } | Self::Configs { entity_id } => {
                push_byte(out, *entity_id)
            }
            Self::ConfigSet(list) => list.encode(out),
            Self::Service {
                entity_id,
                service_code,
            } => {
                push_byte(out, *entity_id)?;
                push_byte(out, *service_code)
            }
        }
    }

    /// Hand the request to the matching handler callback.
    pub fn dispatch<H: RequestHandler + ?Sized>(&self, handler: &mut H) {
        match self {
            Self::Discovery { entity_id } => handler.discovery_requested(*entity_id),
            Self::Values { entity_id } => handler.values_requested(*entity_id),
            Self::Configs { entity_id } => handler.configs_requested(*entity_id),
            Self::ConfigSet(list) => handler.config_set(list.entity_id, &list.items),
            Self::Service {
                entity_id,
                service_code,
            } => handler.service_requested(*entity_id, *service_code),
        }
    }
}

/// Decode a `value_msg` payload.
pub fn decode_values(payload: &[u8]) -> Result<Vec<ValueItem, MAX_VALUE_ITEMS>, ProtocolError> {
    let mut reader = Reader::new(payload);
    let count = reader.read_u8()? as usize;

    if reader.remaining() != count * ValueItem::LEN {
        return Err(ProtocolError::MalformedPayload);
    }

    let mut items = Vec::new();
    for _ in 0..count {
        items
            .push(reader.read::<ValueItem>()?)
            .map_err(|_| ProtocolError::MalformedPayload)?;
    }
    Ok(items)
}

/// One entity of a discovery message with its config descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEntry {
    pub entity: EntityDescriptor,
    pub configs: Vec<ConfigDescriptor, MAX_DISCOVERY_CONFIGS>,
}

/// Decode a `discovery_msg` payload.
pub fn decode_discovery(
    payload: &[u8],
) -> Result<Vec<DiscoveryEntry, MAX_DISCOVERY_ENTITIES>, ProtocolError> {
    let mut reader = Reader::new(payload);
    let mut entries = Vec::new();

    while !reader.is_empty() {
        let entity = reader.read::<EntityDescriptor>()?;
        let count = reader.read_u8()? as usize;

        let mut configs = Vec::new();
        for _ in 0..count {
            configs
                .push(reader.read::<ConfigDescriptor>()?)
                .map_err(|_| ProtocolError::MalformedPayload)?;
        }

        entries
            .push(DiscoveryEntry { entity, configs })
            .map_err(|_| ProtocolError::MalformedPayload)?;
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        discovery: Option<u8>,
        config_set: Option<(u8, usize)>,
        service: Option<(u8, u8)>,
    }

    impl RequestHandler for Recorder {
        fn discovery_requested(&mut self, entity_id: u8) {
            self.discovery = Some(entity_id);
        }

        fn config_set(&mut self, entity_id: u8, items: &[ConfigItem]) {
            self.config_set = Some((entity_id, items.len()));
        }

        fn service_requested(&mut self, entity_id: u8, service_code: u8) {
            self.service = Some((entity_id, service_code));
        }
    }

    #[test]
    fn test_config_list_layout() {
        let mut items = Vec::new();
        items.push(ConfigItem { config_id: 1, value: 0x11 }).unwrap();
        items
            .push(ConfigItem {
                config_id: 2,
                value: 0x1122_3344,
            })
            .unwrap();
        let list = ConfigList { entity_id: 55, items };

        let mut payload: Vec<u8, MAX_PAYLOAD> = Vec::new();
        list.encode(&mut payload).unwrap();

        assert_eq!(
            payload.as_slice(),
            &[55, 2, 1, 0, 0, 0, 0x11, 2, 0x11, 0x22, 0x33, 0x44]
        );
        assert_eq!(ConfigList::decode(&payload).unwrap(), list);
    }

    #[test]
    fn test_config_list_length_mismatch() {
        // Declares two items but carries one and a half
        let payload = [55, 2, 1, 0, 0, 0, 0x11, 2, 0x11];
        assert_eq!(ConfigList::decode(&payload), Err(ProtocolError::MalformedPayload));

        // Trailing garbage
        let payload = [55, 1, 1, 0, 0, 0, 0x11, 0xAA];
        assert_eq!(ConfigList::decode(&payload), Err(ProtocolError::MalformedPayload));
    }

    #[test]
    fn test_request_round_trip() {
        let requests = [
            Request::Discovery { entity_id: 255 },
            Request::Values { entity_id: 4 },
            Request::Configs { entity_id: 5 },
            Request::Service {
                entity_id: 6,
                service_code: 2,
            },
        ];

        for request in requests {
            let mut payload: Vec<u8, MAX_PAYLOAD> = Vec::new();
            request.encode(&mut payload).unwrap();
            assert_eq!(Request::decode(request.message_type(), &payload).unwrap(), request);
        }
    }

    #[test]
    fn test_short_request_rejected() {
        assert_eq!(
            Request::decode(MessageType::ValueReq, &[]),
            Err(ProtocolError::MalformedPayload)
        );
        assert_eq!(
            Request::decode(MessageType::ServiceReq, &[1]),
            Err(ProtocolError::MalformedPayload)
        );
        assert_eq!(
            Request::decode(MessageType::PingMsg, &[1]),
            Err(ProtocolError::MalformedPayload)
        );
    }

    #[test]
    fn test_dispatch_reaches_handler() {
        let mut recorder = Recorder::default();

        Request::Discovery { entity_id: 3 }.dispatch(&mut recorder);
        Request::Service {
            entity_id: 7,
            service_code: 1,
        }
        .dispatch(&mut recorder);
        Request::decode(MessageType::ConfigSetReq, &[9, 1, 4, 0, 0, 0, 1])
            .unwrap()
            .dispatch(&mut recorder);

        assert_eq!(recorder.discovery, Some(3));
        assert_eq!(recorder.service, Some((7, 1)));
        assert_eq!(recorder.config_set, Some((9, 1)));
    }

    #[test]
    fn test_decode_values() {
        let payload = [2, 1, 0, 0, 0, 42, 2, 0xFF, 0xFF, 0xFF, 0xFE];
        let items = decode_values(&payload).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0], ValueItem { entity_id: 1, value: 42 });
        assert_eq!(items[1].value as i32, -2);
        assert_eq!(decode_values(&payload[..7]), Err(ProtocolError::MalformedPayload));
    }

    #[test]
    fn test_decode_discovery() {
        let payload = [
            1, 0, 3, 2, 0x11, 1, // sensor, one config
            10, 2, 0x10, // config 10
            2, 2, 0, 0, 0x00, 0, // cover, no configs
        ];

        let entries = decode_discovery(&payload).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entity.entity_id, 1);
        assert_eq!(entries[0].configs.len(), 1);
        assert_eq!(entries[0].configs[0].config_id, 10);
        assert_eq!(entries[1].configs.len(), 0);

        assert_eq!(
            decode_discovery(&payload[..8]),
            Err(ProtocolError::MalformedPayload)
        );
    }
}
