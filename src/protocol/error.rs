use crate::radio::TransceiverError;

/// Errors raised while framing, parsing or sending packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Packet shorter than its header or its declared length
    Truncated,
    /// Message type outside the defined range (framing/version mismatch)
    UnknownMessageType(u8),
    /// Sub-payload does not match its declared layout
    MalformedPayload,
    /// Record does not fit in the remaining payload space
    PayloadFull,
    /// Builder call without a matching `begin_*` call
    NoMessageInProgress,
    /// Builder call for a different message type than the one in progress
    WrongMessageType,
    /// Underlying radio failure
    Transceiver(TransceiverError),
}

impl From<TransceiverError> for ProtocolError {
    fn from(error: TransceiverError) -> Self {
        Self::Transceiver(error)
    }
}
