#![cfg_attr(not(test), no_std)]

pub mod airtime;
pub mod config;
pub mod node;
pub mod protocol;
pub mod radio;
pub mod storage;
