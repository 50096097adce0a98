//! # Transport Layer
//!
//! TLS client configuration shared by the certificate harvester, the TLS
//! readiness probe and the RPC client.

pub mod tls;

pub use tls::{
    crypto_provider, insecure_client_config, pinned_client_config, PinnedServerVerifier,
    SkipServerVerification, TlsError,
};
