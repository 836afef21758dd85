pub mod entity;
pub mod runner;

pub use entity::{ConfigParameter, Entity};
pub use runner::Node;
