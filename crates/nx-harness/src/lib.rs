//! # Node Exposure Harness
//!
//! Starts a peer-to-peer node daemon in a container on an ephemeral internal
//! network and checks what it exposes: whether the P2P and RPC ports accept
//! connections, whether the RPC port speaks only TLS, and whether an
//! authenticated RPC session can be established against it.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** value types, retry budget, certificate bundle, errors
//! - **Ports Layer:** `OrchestrationBackend` and `LogSink` traits
//! - **Service Layer:** boundary, instance, poller, bootstrap, relay, scenario
//! - **Adapters Layer:** Docker backend (feature `docker`) and sinks
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nx_harness::{
//!     DaemonPort, DockerBackend, HarnessConfig, Scenario, Topology, TracingSink,
//! };
//!
//! # async fn run() -> Result<(), nx_harness::HarnessError> {
//! let backend = Arc::new(DockerBackend::connect().await?);
//! let sink = Arc::new(TracingSink::new("default_ports"));
//!
//! Scenario::new("default_ports", Topology::Isolated, HarnessConfig::from_env(), backend, sink)
//!     .run(|ctx| async move {
//!         ctx.await_port(DaemonPort::PeerToPeer).await?;
//!         ctx.assert_port_closed(DaemonPort::Rpc).await
//!     })
//!     .await
//! # }
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod domain;
pub mod ports;
pub mod service;

/// TLS client configuration and verifiers
pub mod transport;

/// Websocket JSON-RPC client
pub mod rpc;

/// Backend and sink implementations.
/// The Docker backend requires feature: `docker`
pub mod adapters;

/// In-memory backend (FakeBackend)
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod testing;

// =============================================================================
// RE-EXPORTS
// =============================================================================

// Domain
pub use domain::{
    CertificateBundle, ConnectionConfig, Credentials, DaemonImage, DaemonPort, HarnessConfig,
    HarnessError, InstanceHandle, LaunchSpec, NetworkHandle, RetryBudget, P2P_PORT,
    RPC_ENDPOINT, RPC_PORT,
};

// Ports
pub use ports::{BackendError, LogChunk, LogSink, LogSource, OrchestrationBackend};

// Services
pub use service::{
    DaemonInstance, IsolationBoundary, LogRelay, ReadinessPoller, Ready, RelayHandle, Scenario,
    ScenarioContext, SecureBootstrap, Topology,
};

// RPC
pub use rpc::{RpcClient, RpcError};

// Adapters
pub use adapters::{MemorySink, TracingSink};

#[cfg(feature = "docker")]
pub use adapters::DockerBackend;

#[cfg(feature = "test-utils")]
pub use test_utils::FakeBackend;
