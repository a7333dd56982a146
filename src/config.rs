//! Daemon configuration: serde types and JSON persistence.

pub mod persistence;
pub mod types;
