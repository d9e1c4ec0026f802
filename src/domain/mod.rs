//! Domain layer types and invariants.

pub mod api_keys;
pub mod entities;
pub mod error;
pub mod media;
pub mod storage_keys;
