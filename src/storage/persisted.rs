//! Bounds-clamped config values mirrored to the persistent store
//!
//! # Store Layout
//!
//! ```text
//! [value: [u8; size_of::<T>()] little-endian][crc8: u8]
//! ```
//!
//! The tag is CRC-8/MAXIM-DOW over the value bytes. A missing or wrong tag
//! (erased 0xFF store, torn write, bit rot) makes `load()` fall back to the
//! default and rewrite the slot.

use crate::protocol::records::{ConfigDescriptor, ConfigItem, ValueType};
use crate::storage::traits::{ConfigStore, StoreError};
use crc::{Crc, CRC_8_MAXIM_DOW};

/// Integrity tag generator
pub const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_MAXIM_DOW);

/// Largest scalar plus its tag
const MAX_SLOT: usize = 5;

/// Integer types that can back a persisted config value
pub trait ConfigScalar: Copy + Ord + core::fmt::Debug {
    /// Width in bytes
    const SIZE: usize;
    const SIGNED: bool;

    fn write_le(self, out: &mut [u8]);
    fn read_le(bytes: &[u8]) -> Self;
    fn to_i64(self) -> i64;
    /// Narrowing conversion; callers clamp first.
    fn from_i64(value: i64) -> Self;

    /// Wire encoding, sign-extended to 32 bits
    fn to_wire(self) -> u32 {
        self.to_i64() as u32
    }

    /// Interpret a 32-bit wire value according to signedness
    fn wire_to_i64(raw: u32) -> i64 {
        if Self::SIGNED {
            raw as i32 as i64
        } else {
            raw as i64
        }
    }
}

macro_rules! impl_config_scalar {
    ($($t:ty => $signed:expr),* $(,)?) => {
        $(
            impl ConfigScalar for $t {
                const SIZE: usize = core::mem::size_of::<$t>();
                const SIGNED: bool = $signed;

                fn write_le(self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; core::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$t>::from_le_bytes(raw)
                }

                fn to_i64(self) -> i64 {
                    self as i64
                }

                fn from_i64(value: i64) -> Self {
                    value as $t
                }
            }
        )*
    };
}

impl_config_scalar!(
    u8 => false,
    i8 => true,
    u16 => false,
    i16 => true,
    u32 => false,
    i32 => true,
);

/// A config parameter with bounds, a default and a persisted copy.
///
/// The in-memory value is always within `[min, max]`.
#[derive(Debug, Clone)]
pub struct PersistedConfigValue<T: ConfigScalar> {
    config_id: u8,
    value: T,
    min: T,
    max: T,
    default: T,
    address: usize,
    unit: u8,
    precision: u8,
}

impl<T: ConfigScalar> PersistedConfigValue<T> {
    /// Create a value at `address`, starting out as `default`.
    ///
    /// `min <= default <= max` is a caller contract.
    pub fn new(config_id: u8, address: usize, min: T, max: T, default: T) -> Self {
        debug_assert!(min <= default && default <= max, "default outside bounds");

        Self {
            config_id,
            value: default,
            min,
            max,
            default,
            address,
            unit: 0,
            precision: 0,
        }
    }

    /// Unit code and decimal precision reported in discovery
    pub fn with_unit(mut self, unit: u8, precision: u8) -> Self {
        self.unit = unit;
        self.precision = precision;
        self
    }

    /// Bytes occupied in the store, tag included
    pub const fn slot_size() -> usize {
        T::SIZE + 1
    }

    fn clamp(&self, value: T) -> T {
        value.max(self.min).min(self.max)
    }

    fn in_store<S: ConfigStore + ?Sized>(&self, store: &S) -> bool {
        store.contains(self.address, Self::slot_size())
    }

    /// Write the current value and its tag
    fn persist<S: ConfigStore + ?Sized>(&self, store: &mut S) -> Result<(), StoreError> {
        let mut slot = [0u8; MAX_SLOT];
        self.value.write_le(&mut slot);
        slot[T::SIZE] = CRC8.checksum(&slot[..T::SIZE]);
        store.write(self.address, &slot[..Self::slot_size()])
    }

    /// Adopt the stored value, or repair the slot with the default.
    ///
    /// An address outside the store leaves the default in place without
    /// touching the store.
    pub fn load<S: ConfigStore + ?Sized>(&mut self, store: &mut S) -> Result<(), StoreError> {
        if !self.in_store(store) {
            log::warn!("Config {}: address {} outside store", self.config_id, self.address);
            self.value = self.default;
            return Ok(());
        }

        let mut slot = [0u8; MAX_SLOT];
        let slot = &mut slot[..Self::slot_size()];

        let valid = match store.read(self.address, slot) {
            Ok(()) => CRC8.checksum(&slot[..T::SIZE]) == slot[T::SIZE],
            Err(e) => {
                log::warn!("Config {}: read failed ({:?})", self.config_id, e);
                false
            }
        };

        if valid {
            self.value = self.clamp(T::read_le(&slot[..T::SIZE]));
            return Ok(());
        }

        log::warn!(
            "Config {}: integrity check failed, restoring default {:?}",
            self.config_id,
            self.default
        );
        self.value = self.default;
        self.persist(store)
    }

    /// Clamp `value` into bounds, keep it and write it through.
    ///
    /// The in-memory value is updated even when the store write fails or
    /// the address lies outside the store.
    pub fn set_value<S: ConfigStore + ?Sized>(&mut self, value: T, store: &mut S) -> Result<(), StoreError> {
        self.value = self.clamp(value);

        if !self.in_store(store) {
            return Ok(());
        }
        self.persist(store)
    }

    /// Apply a value received over the radio
    pub fn set_from_wire<S: ConfigStore + ?Sized>(&mut self, raw: u32, store: &mut S) -> Result<(), StoreError> {
        let wide = T::wire_to_i64(raw);
        let clamped = wide.max(self.min.to_i64()).min(self.max.to_i64());
        self.set_value(T::from_i64(clamped), store)
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn config_id(&self) -> u8 {
        self.config_id
    }

    pub fn min_value(&self) -> T {
        self.min
    }

    pub fn max_value(&self) -> T {
        self.max
    }

    pub fn default_value(&self) -> T {
        self.default
    }

    pub fn address(&self) -> usize {
        self.address
    }

    /// Discovery description: unit, width, signedness, precision
    pub fn descriptor(&self) -> ConfigDescriptor {
        ConfigDescriptor {
            config_id: self.config_id,
            unit: self.unit,
            value_type: ValueType::new(T::SIZE as u8, T::SIGNED, self.precision),
        }
    }

    /// Current value in wire encoding
    pub fn config_item(&self) -> ConfigItem {
        ConfigItem {
            config_id: self.config_id,
            value: self.value.to_wire(),
        }
    }
}
