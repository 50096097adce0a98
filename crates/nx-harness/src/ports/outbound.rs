//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the harness requires from its environment: an orchestration
//! backend that owns networks and containers, and a line-oriented reporting
//! sink.

use std::net::IpAddr;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::domain::{DaemonPort, InstanceHandle, LaunchSpec, NetworkHandle};

/// Errors reported by an orchestration backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Backend socket/API cannot be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// Referenced network or container does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Request conflicts with existing state (name taken, endpoints attached).
    #[error("conflict: {0}")]
    Conflict(String),
    /// Any other API-level failure.
    #[error("backend returned {status}: {message}")]
    Api {
        /// HTTP status from the backend API.
        status: u16,
        /// Backend message.
        message: String,
    },
    /// Transport or decoding failure talking to the backend.
    #[error("backend transport error: {0}")]
    Transport(String),
}

impl BackendError {
    /// `true` if the referenced resource is already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Which container stream a log chunk came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogSource {
    Stdout,
    Stderr,
}

/// One write from a container's output stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogChunk {
    pub source: LogSource,
    pub bytes: Vec<u8>,
}

impl LogChunk {
    pub fn stdout(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source: LogSource::Stdout,
            bytes: bytes.into(),
        }
    }

    pub fn stderr(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source: LogSource::Stderr,
            bytes: bytes.into(),
        }
    }
}

/// Abstract interface over whatever manages networks and containers.
///
/// The harness services only talk to this trait. The Docker adapter
/// implements it for real runs; `FakeBackend` implements it for unit tests.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: the log relay task holds the log
/// stream while the scenario keeps issuing calls.
#[async_trait]
pub trait OrchestrationBackend: Send + Sync {
    /// Check that the backend answers.
    async fn ping(&self) -> Result<(), BackendError>;

    /// Create a network. `internal` networks have no route outside the backend.
    async fn create_network(&self, name: &str, internal: bool)
        -> Result<NetworkHandle, BackendError>;

    /// Networks whose name is exactly `name`.
    async fn list_networks(&self, name: &str) -> Result<Vec<NetworkHandle>, BackendError>;

    /// Containers currently attached to `network`.
    async fn network_members(
        &self,
        network: &NetworkHandle,
    ) -> Result<Vec<InstanceHandle>, BackendError>;

    /// Attach a running container to `network`.
    async fn attach(
        &self,
        network: &NetworkHandle,
        instance: &InstanceHandle,
    ) -> Result<(), BackendError>;

    /// Force-detach a container from `network`.
    async fn detach(
        &self,
        network: &NetworkHandle,
        instance: &InstanceHandle,
    ) -> Result<(), BackendError>;

    /// Remove a network.
    async fn remove_network(&self, network: &NetworkHandle) -> Result<(), BackendError>;

    /// Create and start a container.
    ///
    /// With `spec.network == None` the container gets no network driver at all.
    async fn start(&self, spec: &LaunchSpec) -> Result<InstanceHandle, BackendError>;

    /// IP of `instance` inside `network`, if it has one.
    async fn address_in(
        &self,
        instance: &InstanceHandle,
        network: &NetworkHandle,
    ) -> Result<Option<IpAddr>, BackendError>;

    /// Host port bound to `port` of `instance`, if it is published.
    async fn published_port(
        &self,
        instance: &InstanceHandle,
        port: DaemonPort,
    ) -> Result<Option<u16>, BackendError>;

    /// Force-remove a container and its anonymous volumes.
    async fn remove_instance(&self, instance: &InstanceHandle) -> Result<(), BackendError>;

    /// Follow the container's stdout and stderr from the beginning.
    ///
    /// The stream ends when the container stops.
    fn logs(&self, instance: &InstanceHandle) -> BoxStream<'static, Result<LogChunk, BackendError>>;
}

/// Line-oriented reporting surface.
///
/// Receives relayed container output and retry diagnostics. Implementations
/// serialize concurrent writes themselves.
pub trait LogSink: Send + Sync {
    /// Append one line.
    fn record(&self, line: &str);
}
