//! KalshiLink — Kalshi EUR/USD prediction market → Arc Testnet oracle bridge.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod chain;
pub mod config;
pub mod mapper;
pub mod markets;
pub mod scheduler;
pub mod server;
pub mod types;
