//! Protocol engine: framing, dispatch, sequencing and airtime accounting
//!
//! Owns the transceiver, the clock, the optional cipher and the airtime
//! accountant. Incoming requests are decoded and handed to a
//! [`RequestHandler`]; outgoing reports are assembled with the
//! `begin_*`/`add_*`/[`end_msg`](ProtocolEngine::end_msg) builder calls.
//!
//! The engine measures every transmission but never refuses one. Callers
//! that want to respect the duty cycle check
//! [`is_limit_reached`](ProtocolEngine::is_limit_reached) before building.

use crate::airtime::AirTimeAccountant;
use crate::config::{addresses, airtime, node};
use crate::config::protocol::{ENCRYPT_OFFSET, HEADER_SIZE, MAX_PACKET_SIZE, MAX_PAYLOAD};
use crate::protocol::cipher::{PayloadCipher, Plaintext};
use crate::protocol::error::ProtocolError;
use crate::protocol::header::{flags, Header, MessageType};
use crate::protocol::message::{Request, RequestHandler};
use crate::protocol::records::{
    append_record, ConfigDescriptor, ConfigItem, EntityDescriptor, ValueItem, WireRecord,
};
use crate::radio::{Clock, Transceiver, TransceiverError};
use heapless::Vec;

/// Runtime settings of the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Address of this node
    pub address: u8,
    /// Destination of every report
    pub gateway: u8,
    /// Airtime budget in parts per million of an hour
    pub duty_cycle_limit_ppm: u16,
    /// Receive window per `receive()` call
    pub rx_timeout_ms: u32,
    /// Set the ack-request bit on outgoing reports
    pub request_ack: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            address: addresses::NODE,
            gateway: addresses::GATEWAY,
            duty_cycle_limit_ppm: airtime::DEFAULT_LIMIT_PPM,
            rx_timeout_ms: node::RX_POLL_INTERVAL_MS,
            request_ack: true,
        }
    }
}

/// What a call to [`ProtocolEngine::receive`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Nothing arrived within the receive window
    Idle,
    /// Packet addressed to another node, dropped
    NotForUs,
    /// Request handled (and acknowledged if asked to)
    Handled(MessageType),
    /// Acknowledgment of one of our packets
    Ack { id: u8 },
    /// Valid packet of a type the node does not act on
    Ignored(MessageType),
}

/// Report under construction
struct Builder {
    message_type: Option<MessageType>,
    payload: Vec<u8, MAX_PAYLOAD>,
    /// Position of the count byte the next item increments
    count_index: Option<usize>,
}

impl Builder {
    const fn new() -> Self {
        Self {
            message_type: None,
            payload: Vec::new(),
            count_index: None,
        }
    }

    fn begin(&mut self, message_type: MessageType) {
        self.message_type = Some(message_type);
        self.payload.clear();
        self.count_index = None;
    }

    fn ensure(&self, message_type: MessageType) -> Result<(), ProtocolError> {
        match self.message_type {
            None => Err(ProtocolError::NoMessageInProgress),
            Some(current) if current != message_type => Err(ProtocolError::WrongMessageType),
            Some(_) => Ok(()),
        }
    }

    fn push_count(&mut self) -> Result<(), ProtocolError> {
        self.payload
            .push(0)
            .map_err(|_| ProtocolError::PayloadFull)?;
        self.count_index = Some(self.payload.len() - 1);
        Ok(())
    }

    fn increment_count(&mut self) {
        if let Some(index) = self.count_index {
            self.payload[index] += 1;
        }
    }

    fn free(&self) -> usize {
        self.payload.capacity() - self.payload.len()
    }
}

/// Packet protocol engine for one node
pub struct ProtocolEngine<R, K, C = Plaintext> {
    radio: R,
    clock: K,
    cipher: C,
    config: EngineConfig,
    airtime: AirTimeAccountant,
    next_id: u8,
    builder: Builder,
    last_ack_id: Option<u8>,
}

impl<R, K> ProtocolEngine<R, K, Plaintext>
where
    R: Transceiver,
    K: Clock,
{
    /// Create an engine that sends in clear text
    pub fn new(radio: R, clock: K, config: EngineConfig) -> Self {
        let airtime = AirTimeAccountant::new(config.duty_cycle_limit_ppm, clock.now_ms());

        Self {
            radio,
            clock,
            cipher: Plaintext,
            config,
            airtime,
            next_id: 0,
            builder: Builder::new(),
            last_ack_id: None,
        }
    }
}

impl<R, K, C> ProtocolEngine<R, K, C>
where
    R: Transceiver,
    K: Clock,
    C: PayloadCipher,
{
    /// Encrypt everything past the clear header bytes with `cipher`
    pub fn with_cipher<E: PayloadCipher>(self, cipher: E) -> ProtocolEngine<R, K, E> {
        ProtocolEngine {
            radio: self.radio,
            clock: self.clock,
            cipher,
            config: self.config,
            airtime: self.airtime,
            next_id: self.next_id,
            builder: self.builder,
            last_ack_id: self.last_ack_id,
        }
    }

    pub fn address(&self) -> u8 {
        self.config.address
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Id of the most recent acknowledgment received from the gateway
    pub fn last_ack_id(&self) -> Option<u8> {
        self.last_ack_id
    }

    /// Airtime used over the last hour in milliseconds
    pub fn airtime_ms(&mut self) -> u32 {
        self.airtime.time_ms(self.clock.now_ms())
    }

    /// Airtime used over the last hour in parts per million
    pub fn duty_cycle_ppm(&mut self) -> u16 {
        self.airtime.time_ppm(self.clock.now_ms())
    }

    pub fn is_limit_reached(&mut self) -> bool {
        self.airtime.is_limit_reached(self.clock.now_ms())
    }

    fn next_sequence_id(&mut self) -> u8 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Poll the transceiver once and dispatch whatever arrived.
    pub async fn receive<H: RequestHandler + ?Sized>(
        &mut self,
        handler: &mut H,
    ) -> Result<ReceiveOutcome, ProtocolError> {
        let packet = match self.radio.receive(self.config.rx_timeout_ms).await {
            Ok(packet) => packet,
            Err(TransceiverError::Timeout) => return Ok(ReceiveOutcome::Idle),
            Err(e) => return Err(e.into()),
        };

        log::debug!(
            "RX: {} bytes (RSSI: {}, SNR: {})",
            packet.data.len(),
            packet.rssi,
            packet.snr
        );

        let mut data = packet.data;
        if data.len() < HEADER_SIZE {
            log::warn!("RX: short packet ({} bytes)", data.len());
            return Err(ProtocolError::Truncated);
        }

        let routing = [data[0], data[1], data[2], data[3]];
        self.cipher.apply(routing, &mut data[ENCRYPT_OFFSET..]);

        let header = Header::decode(&data)?;
        if header.dst != self.config.address {
            log::debug!("RX: packet for {:#04x}, dropped", header.dst);
            return Ok(ReceiveOutcome::NotForUs);
        }

        let message_type = header.message_type().map_err(|e| {
            log::warn!("RX: unknown message type in flags {:#04x}", header.flags);
            e
        })?;

        let end = HEADER_SIZE + header.len as usize;
        if end > data.len() {
            log::warn!("RX: declared length {} exceeds packet", header.len);
            return Err(ProtocolError::Truncated);
        }
        let payload = &data[HEADER_SIZE..end];

        if header.is_ack_response() {
            log::debug!("RX: ack for id {}", header.id);
            self.last_ack_id = Some(header.id);
            return Ok(ReceiveOutcome::Ack { id: header.id });
        }

        match message_type {
            MessageType::PingReq => {
                log::debug!("RX: ping from {:#04x} (RSSI: {})", header.src, packet.rssi);
                let rssi = packet.rssi.clamp(i8::MIN as i16, i8::MAX as i16) as i8;
                let reply = Header {
                    dst: header.src,
                    src: self.config.address,
                    id: header.id,
                    flags: MessageType::PingMsg as u8,
                    len: 1,
                };
                self.transmit(&reply, &[rssi as u8]).await?;
                Ok(ReceiveOutcome::Handled(message_type))
            }
            MessageType::DiscoveryReq
            | MessageType::ValueReq
            | MessageType::ConfigReq
            | MessageType::ConfigSetReq
            | MessageType::ServiceReq => {
                let request = Request::decode(message_type, payload).map_err(|e| {
                    log::warn!("RX: malformed {:?} payload", message_type);
                    e
                })?;
                request.dispatch(handler);

                if header.is_ack_request() {
                    let ack = header.ack(self.config.address);
                    self.transmit(&ack, &[]).await?;
                }
                Ok(ReceiveOutcome::Handled(message_type))
            }
            _ => {
                log::debug!("RX: ignoring {:?}", message_type);
                Ok(ReceiveOutcome::Ignored(message_type))
            }
        }
    }

    /// Frame, encrypt and send one packet, recording its airtime.
    async fn transmit(&mut self, header: &Header, payload: &[u8]) -> Result<(), ProtocolError> {
        let mut packet: Vec<u8, MAX_PACKET_SIZE> = Vec::new();
        packet
            .extend_from_slice(&header.encode())
            .map_err(|_| ProtocolError::PayloadFull)?;
        packet
            .extend_from_slice(payload)
            .map_err(|_| ProtocolError::PayloadFull)?;

        let routing = [header.dst, header.src, header.id, header.flags];
        self.cipher.apply(routing, &mut packet[ENCRYPT_OFFSET..]);

        let start = self.clock.now_ms();
        let result = self.radio.transmit(&packet).await;
        let end = self.clock.now_ms();
        self.airtime.record(start, end);

        match result {
            Ok(()) => {
                log::debug!("TX: id {} ({} bytes, {} ms)", header.id, packet.len(), end.wrapping_sub(start));
                Ok(())
            }
            Err(e) => {
                log::warn!("TX: id {} failed ({:?})", header.id, e);
                Err(e.into())
            }
        }
    }

    /// Start a discovery report
    pub fn begin_discovery_msg(&mut self) {
        self.builder.begin(MessageType::DiscoveryMsg);
    }

    /// Append an entity descriptor; following config descriptors belong to it.
    pub fn add_discovery_entity(&mut self, entity: &EntityDescriptor) -> Result<(), ProtocolError> {
        self.builder.ensure(MessageType::DiscoveryMsg)?;
        if self.builder.free() < EntityDescriptor::LEN + 1 {
            return Err(ProtocolError::PayloadFull);
        }

        append_record(&mut self.builder.payload, entity)?;
        self.builder.push_count()
    }

    /// Append a config descriptor to the last added entity
    pub fn add_discovery_config(&mut self, config: &ConfigDescriptor) -> Result<(), ProtocolError> {
        self.builder.ensure(MessageType::DiscoveryMsg)?;
        if self.builder.count_index.is_none() {
            return Err(ProtocolError::NoMessageInProgress);
        }

        append_record(&mut self.builder.payload, config)?;
        self.builder.increment_count();
        Ok(())
    }

    /// Start a value report
    pub fn begin_values_msg(&mut self) {
        self.builder.begin(MessageType::ValueMsg);
        // Cannot fail on an empty payload
        let _ = self.builder.push_count();
    }

    pub fn add_value_item(&mut self, item: &ValueItem) -> Result<(), ProtocolError> {
        self.builder.ensure(MessageType::ValueMsg)?;
        append_record(&mut self.builder.payload, item)?;
        self.builder.increment_count();
        Ok(())
    }

    /// Start a config report for one entity
    pub fn begin_configs_msg(&mut self, entity_id: u8) {
        self.builder.begin(MessageType::ConfigMsg);
        let _ = self.builder.payload.push(entity_id);
        let _ = self.builder.push_count();
    }

    pub fn add_config_item(&mut self, item: &ConfigItem) -> Result<(), ProtocolError> {
        self.builder.ensure(MessageType::ConfigMsg)?;
        append_record(&mut self.builder.payload, item)?;
        self.builder.increment_count();
        Ok(())
    }

    /// Whether a report is under construction
    pub fn is_building(&self) -> bool {
        self.builder.message_type.is_some()
    }

    /// Number of payload bytes accumulated so far
    pub fn payload_len(&self) -> usize {
        self.builder.payload.len()
    }

    /// Send the report under construction to the gateway.
    ///
    /// Returns the sequence id used. The builder is reset even when the
    /// transmission fails.
    pub async fn end_msg(&mut self) -> Result<u8, ProtocolError> {
        let message_type = self
            .builder
            .message_type
            .take()
            .ok_or(ProtocolError::NoMessageInProgress)?;
        let payload = core::mem::take(&mut self.builder.payload);
        self.builder.count_index = None;

        let mut flags = message_type as u8;
        if self.config.request_ack {
            flags |= flags::ACK_REQUEST;
        }

        let id = self.next_sequence_id();
        let header = Header {
            dst: self.config.gateway,
            src: self.config.address,
            id,
            flags,
            len: payload.len() as u8,
        };

        self.transmit(&header, &payload).await?;
        Ok(id)
    }
}
