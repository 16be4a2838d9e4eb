//! Infrastructure implementations.
//!
//! Port traits plus the storage, clock and configuration adapters behind them.

pub mod clock;
pub mod config;
pub mod kv_store;
pub mod maintenance;
pub mod ports;
