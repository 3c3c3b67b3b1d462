//! Infrastructure adapters and runtime bootstrap.

pub mod auth;
pub mod db;
pub mod error;
pub mod http;
pub mod telemetry;
pub mod uploads;
