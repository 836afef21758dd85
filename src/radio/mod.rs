pub mod clock;
pub mod traits;

pub use clock::Clock;
#[cfg(feature = "embedded")]
pub use clock::EmbassyClock;
pub use traits::{RxPacket, Transceiver, TransceiverError};
