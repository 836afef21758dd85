pub mod cipher;
pub mod engine;
pub mod error;
pub mod header;
pub mod message;
pub mod records;

pub use cipher::{AesCtrCipher, PayloadCipher, Plaintext};
pub use engine::{EngineConfig, ProtocolEngine, ReceiveOutcome};
pub use error::ProtocolError;
pub use header::{Header, MessageType};
pub use message::{ConfigList, Request, RequestHandler};
pub use records::{ComponentType, ConfigDescriptor, ConfigItem, EntityDescriptor, ValueItem, ValueType};
