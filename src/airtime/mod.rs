pub mod accountant;
pub mod ring;

pub use accountant::AirTimeAccountant;
pub use ring::FixedRing;
