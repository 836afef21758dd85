//! Byte-addressable persistent store abstraction
//!
//! Backed by EEPROM or an emulated flash page on the target and by an
//! in-memory array in tests. Writes are not transactional.

/// Errors that can occur during store operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Access outside the store's address range
    OutOfRange,
    /// Underlying read failed
    ReadFailed,
    /// Underlying write failed
    WriteFailed,
}

/// Abstract persistent byte store
pub trait ConfigStore {
    /// Number of addressable bytes
    fn capacity(&self) -> usize;

    /// Fill `buf` with the bytes starting at `address`
    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), StoreError>;

    /// Write `data` starting at `address`
    fn write(&mut self, address: usize, data: &[u8]) -> Result<(), StoreError>;

    /// Whether `len` bytes starting at `address` lie inside the store
    fn contains(&self, address: usize, len: usize) -> bool {
        address
            .checked_add(len)
            .is_some_and(|end| end <= self.capacity())
    }
}
