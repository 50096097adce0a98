//! # Domain Layer
//!
//! Pure value types: daemon interface constants, backend handles, retry
//! budget, certificate bundle, connection configuration and the error
//! taxonomy. Nothing here performs I/O.

pub mod certificate;
pub mod config;
pub mod connection;
pub mod errors;
pub mod retry;
pub mod types;

pub use certificate::CertificateBundle;
pub use config::HarnessConfig;
pub use connection::ConnectionConfig;
pub use errors::HarnessError;
pub use retry::{Intervals, RetryBudget};
pub use types::{
    rpc_flags, Credentials, DaemonImage, DaemonPort, InstanceHandle, LaunchSpec, NetworkHandle,
    P2P_PORT, RPC_ENDPOINT, RPC_PORT,
};
