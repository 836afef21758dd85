//! Transceiver trait for abstraction and testability
//!
//! The protocol engine only needs to push and pull whole packets; the
//! concrete radio driver is supplied by the firmware and swapped with a mock
//! in tests.

use crate::config::protocol::MAX_PACKET_SIZE;
use core::future::Future;
use heapless::Vec;

/// Errors that can occur during transceiver operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransceiverError {
    /// No packet arrived within the receive window
    Timeout,
    /// CRC error in received packet
    CrcError,
    /// Transmission failed
    TransmitFailed,
    /// Packet larger than the radio accepts
    PacketTooLarge,
}

/// Received packet with metadata
#[derive(Debug, Clone)]
pub struct RxPacket {
    /// Raw packet bytes, header included
    pub data: Vec<u8, MAX_PACKET_SIZE>,
    /// Received Signal Strength Indicator in dBm
    pub rssi: i16,
    /// Signal-to-Noise Ratio in dB
    pub snr: i8,
}

/// Abstract packet radio
pub trait Transceiver {
    /// Initialise the radio hardware
    fn init(&mut self) -> impl Future<Output = Result<(), TransceiverError>>;

    /// Transmit one packet
    ///
    /// Completes once the packet has left the antenna, so the time spent in
    /// this call is the packet's time on air.
    fn transmit(&mut self, data: &[u8]) -> impl Future<Output = Result<(), TransceiverError>>;

    /// Receive one packet
    ///
    /// Returns [`TransceiverError::Timeout`] if nothing arrives within
    /// `timeout_ms`.
    fn receive(&mut self, timeout_ms: u32) -> impl Future<Output = Result<RxPacket, TransceiverError>>;
}

#[cfg(test)]
pub mod mock {
    //! Mock transceiver for testing

    use super::*;
    use core::cell::RefCell;

    /// Mock transceiver for unit testing
    pub struct MockTransceiver {
        /// Packets queued to be returned by receive()
        rx_queue: RefCell<Vec<RxPacket, 8>>,
        /// Record of transmitted packets
        tx_history: RefCell<Vec<Vec<u8, MAX_PACKET_SIZE>, 16>>,
        /// Error to return on next transmit
        next_tx_error: RefCell<Option<TransceiverError>>,
        /// Error to return on next receive
        next_rx_error: RefCell<Option<TransceiverError>>,
        /// Whether init has been called
        initialised: RefCell<bool>,
    }

    impl MockTransceiver {
        /// Create a new mock transceiver
        pub fn new() -> Self {
            Self {
                rx_queue: RefCell::new(Vec::new()),
                tx_history: RefCell::new(Vec::new()),
                next_tx_error: RefCell::new(None),
                next_rx_error: RefCell::new(None),
                initialised: RefCell::new(false),
            }
        }

        /// Queue raw bytes to be returned by a later receive() call
        pub fn queue_rx(&self, data: &[u8], rssi: i16) {
            let mut packet = Vec::new();
            let _ = packet.extend_from_slice(data);
            let _ = self.rx_queue.borrow_mut().push(RxPacket {
                data: packet,
                rssi,
                snr: 8,
            });
        }

        /// Set an error to be returned by the next transmit() call
        pub fn set_next_tx_error(&self, error: TransceiverError) {
            *self.next_tx_error.borrow_mut() = Some(error);
        }

        /// Set an error to be returned by the next receive() call
        pub fn set_next_rx_error(&self, error: TransceiverError) {
            *self.next_rx_error.borrow_mut() = Some(error);
        }

        /// Get all transmitted packets
        pub fn get_tx_history(&self) -> Vec<Vec<u8, MAX_PACKET_SIZE>, 16> {
            self.tx_history.borrow().clone()
        }

        /// Check if the radio has been initialised
        pub fn is_initialised(&self) -> bool {
            *self.initialised.borrow()
        }
    }

    impl Default for MockTransceiver {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Transceiver for MockTransceiver {
        async fn init(&mut self) -> Result<(), TransceiverError> {
            *self.initialised.borrow_mut() = true;
            Ok(())
        }

        async fn transmit(&mut self, data: &[u8]) -> Result<(), TransceiverError> {
            if let Some(error) = self.next_tx_error.borrow_mut().take() {
                return Err(error);
            }

            let mut packet = Vec::new();
            packet
                .extend_from_slice(data)
                .map_err(|_| TransceiverError::PacketTooLarge)?;
            let _ = self.tx_history.borrow_mut().push(packet);

            Ok(())
        }

        async fn receive(&mut self, _timeout_ms: u32) -> Result<RxPacket, TransceiverError> {
            if let Some(error) = self.next_rx_error.borrow_mut().take() {
                return Err(error);
            }

            // Pop from front (FIFO order)
            let mut queue = self.rx_queue.borrow_mut();
            if queue.is_empty() {
                return Err(TransceiverError::Timeout);
            }

            Ok(queue.remove(0))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_mock_transmit() {
            let mut radio = MockTransceiver::new();

            futures::executor::block_on(async {
                radio.init().await.unwrap();
                assert!(radio.is_initialised());

                let data = [0x01, 0x02, 0x03];
                radio.transmit(&data).await.unwrap();

                let history = radio.get_tx_history();
                assert_eq!(history.len(), 1);
                assert_eq!(history[0].as_slice(), &data);
            });
        }

        #[test]
        fn test_mock_receive_fifo() {
            let mut radio = MockTransceiver::new();

            futures::executor::block_on(async {
                radio.queue_rx(&[0x01], -50);
                radio.queue_rx(&[0x02], -60);

                let first = radio.receive(100).await.unwrap();
                assert_eq!(first.data.as_slice(), &[0x01]);
                assert_eq!(first.rssi, -50);

                let second = radio.receive(100).await.unwrap();
                assert_eq!(second.data.as_slice(), &[0x02]);

                assert_eq!(radio.receive(100).await.unwrap_err(), TransceiverError::Timeout);
            });
        }

        #[test]
        fn test_mock_errors_are_one_shot() {
            let mut radio = MockTransceiver::new();

            futures::executor::block_on(async {
                radio.set_next_tx_error(TransceiverError::TransmitFailed);
                assert_eq!(radio.transmit(&[0x01]).await, Err(TransceiverError::TransmitFailed));
                radio.transmit(&[0x02]).await.unwrap();

                radio.set_next_rx_error(TransceiverError::CrcError);
                assert_eq!(radio.receive(10).await.unwrap_err(), TransceiverError::CrcError);
                assert_eq!(radio.receive(10).await.unwrap_err(), TransceiverError::Timeout);
            });
        }
    }
}
