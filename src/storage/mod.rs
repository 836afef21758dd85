pub mod persisted;
pub mod traits;

pub use persisted::{ConfigScalar, PersistedConfigValue};
pub use traits::{ConfigStore, StoreError};
