//! Optional payload encryption
//!
//! Everything from [`ENCRYPT_OFFSET`] onwards is run through a symmetric
//! stream cipher; destination, source, id and flags stay in clear so that
//! packets can be routed and logged without the key. Counter mode is its own
//! inverse, so the same call encrypts and decrypts.
//!
//! [`ENCRYPT_OFFSET`]: crate::config::protocol::ENCRYPT_OFFSET

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Clear-text header bytes of a packet: dst, src, id, flags
pub type Routing = [u8; 4];

/// Symmetric stream cipher applied to the protected part of a packet
pub trait PayloadCipher {
    /// XOR the keystream for the packet identified by `routing` into `data`.
    fn apply(&mut self, routing: Routing, data: &mut [u8]);
}

/// No encryption
#[derive(Debug, Clone, Copy, Default)]
pub struct Plaintext;

impl PayloadCipher for Plaintext {
    fn apply(&mut self, _routing: Routing, _data: &mut [u8]) {}
}

/// AES-128 in counter mode.
///
/// The clear header bytes are folded into the IV. The flags byte separates a
/// report from a ping reply or an ack carrying the same id, since they differ
/// in ack bits or message type. Reports of one type repeat their IV once the
/// 8-bit sequence id wraps, so the key must be rotated well before that many
/// packets have been sent under it.
pub struct AesCtrCipher {
    key: [u8; 16],
    iv: [u8; 16],
}

impl AesCtrCipher {
    pub fn new(key: [u8; 16], iv: [u8; 16]) -> Self {
        Self { key, iv }
    }

    fn packet_iv(&self, routing: Routing) -> [u8; 16] {
        let mut iv = self.iv;
        for (byte, r) in iv.iter_mut().zip(routing) {
            *byte ^= r;
        }
        iv
    }
}

impl PayloadCipher for AesCtrCipher {
    fn apply(&mut self, routing: Routing, data: &mut [u8]) {
        let iv = self.packet_iv(routing);
        let mut cipher = Aes128Ctr::new(&self.key.into(), &iv.into());
        cipher.apply_keystream(data);
    }
}
