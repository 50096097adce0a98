//! # RPC Client
//!
//! Minimal JSON-RPC client for the daemon's `wss://host:8334/ws` endpoint.
//! Only what the harness needs to prove an authenticated session is live.

mod client;
mod error;

pub use client::RpcClient;
pub use error::RpcError;
