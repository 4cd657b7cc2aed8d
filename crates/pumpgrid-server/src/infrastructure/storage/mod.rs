//! Persistence: the TOML configuration file and the SQLite telemetry store.

pub mod config;
pub mod store;
