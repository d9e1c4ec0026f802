//! Application layer: services orchestrating domain rules over repository
//! and storage ports.

pub mod api_keys;
pub mod error;
pub mod posts;
pub mod repos;
pub mod storage;
