//! Compile-time configuration constants for the radio node

/// Node addressing
pub mod addresses {
    /// Address of the single gateway this node talks to
    pub const GATEWAY: u8 = 0x00;
    /// Default address of this node
    pub const NODE: u8 = 0x01;
    /// Entity id meaning "every entity on the node"
    pub const BROADCAST_ENTITY: u8 = 0xFF;
}

/// Radio packet limits
pub mod protocol {
    /// Maximum packet size accepted by the transceiver
    pub const MAX_PACKET_SIZE: usize = 51;

    /// Fixed header size: dst, src, id, flags, len
    pub const HEADER_SIZE: usize = 5;

    /// Maximum payload size behind the header
    pub const MAX_PAYLOAD: usize = MAX_PACKET_SIZE - HEADER_SIZE;

    /// Maximum config items carried by one configSet request
    pub const MAX_CONFIG_ITEMS: usize = (MAX_PAYLOAD - 2) / 5;

    /// First byte covered by the cipher. dst, src, id and flags stay in clear.
    pub const ENCRYPT_OFFSET: usize = 4;
}

/// Duty cycle accounting
pub mod airtime {
    pub const MINUTE_MS: u32 = 60_000;
    pub const HOUR_MS: u32 = 60 * MINUTE_MS;

    /// Number of one-minute buckets in the rolling window
    pub const BUCKETS: usize = 60;

    /// Default airtime limit: 1% of an hour
    pub const DEFAULT_LIMIT_PPM: u16 = 10_000;
}

/// Host loop timing
pub mod node {
    /// Receive window per poll (max latency for outgoing reports)
    pub const RX_POLL_INTERVAL_MS: u32 = 100;
}
