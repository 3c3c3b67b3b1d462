//! Domain layer types and invariants.

pub mod error;
pub mod posts;
pub mod slug;
pub mod uploads;
