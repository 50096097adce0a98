//! Scenario runner: one boundary, one daemon, guaranteed teardown.

use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{info, warn};

use super::{
    probe, DaemonInstance, IsolationBoundary, LogRelay, ReadinessPoller, Ready, RelayHandle,
    SecureBootstrap,
};
use crate::domain::{DaemonPort, HarnessConfig, HarnessError, LaunchSpec};
use crate::ports::{LogSink, OrchestrationBackend};
use crate::rpc::RpcClient;

/// How the daemon is wired for a scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// No network at all; default daemon flags.
    Detached,
    /// Internal network; default daemon flags.
    Isolated,
    /// Internal network; RPC listener enabled with the configured credentials.
    IsolatedWithRpc,
}

impl Topology {
    fn has_network(self) -> bool {
        !matches!(self, Self::Detached)
    }
}

/// One test case against one daemon instance.
pub struct Scenario {
    name: String,
    topology: Topology,
    config: HarnessConfig,
    backend: Arc<dyn OrchestrationBackend>,
    sink: Arc<dyn LogSink>,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        topology: Topology,
        config: HarnessConfig,
        backend: Arc<dyn OrchestrationBackend>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            name: name.into(),
            topology,
            config,
            backend,
            sink,
        }
    }

    /// Set up, run `body`, and tear down on every exit path.
    ///
    /// Teardown runs after success, after an error, and after a panic in
    /// `body`; a panic is resumed once teardown has finished. When both the
    /// body and teardown fail the result is
    /// [`HarnessError::TeardownAfterFailure`].
    pub async fn run<F, Fut>(self, body: F) -> Result<(), HarnessError>
    where
        F: FnOnce(Arc<ScenarioContext>) -> Fut,
        Fut: Future<Output = Result<(), HarnessError>>,
    {
        let Self {
            name,
            topology,
            config,
            backend,
            sink,
        } = self;
        info!(scenario = %name, ?topology, "setting up scenario");

        let boundary = if topology.has_network() {
            let network = config.network_name(&name);
            Some(IsolationBoundary::create(backend.clone(), &network).await?)
        } else {
            None
        };

        let mut spec = LaunchSpec::new(config.image.clone());
        if let Some(boundary) = &boundary {
            spec = spec.on_network(boundary.handle().clone());
        }
        if topology == Topology::IsolatedWithRpc {
            spec = spec.with_rpc(&config.credentials, &config.rpc_listen);
        }

        let instance = match DaemonInstance::start(backend.clone(), spec).await {
            Ok(instance) => instance,
            Err(e) => {
                let teardown = match &boundary {
                    Some(boundary) => boundary.close().await,
                    None => Ok(()),
                };
                return Err(e.with_teardown(teardown));
            }
        };

        let relay = LogRelay::spawn(backend.as_ref(), instance.handle(), sink.clone());
        let poller = ReadinessPoller::new(config.retry, sink.clone());
        let ctx = Arc::new(ScenarioContext {
            name,
            config,
            instance,
            boundary,
            relay,
            poller,
            sink,
        });

        let outcome = AssertUnwindSafe(body(ctx.clone())).catch_unwind().await;
        let teardown = ctx.teardown().await;

        match outcome {
            Err(panic) => {
                if let Err(e) = teardown {
                    warn!(scenario = %ctx.name, error = %e, "teardown failed after panic");
                }
                std::panic::resume_unwind(panic)
            }
            Ok(Err(e)) => Err(e.with_teardown(teardown)),
            Ok(Ok(())) => {
                info!(scenario = %ctx.name, "scenario passed");
                teardown
            }
        }
    }
}

/// Everything a scenario body can touch.
pub struct ScenarioContext {
    name: String,
    config: HarnessConfig,
    instance: DaemonInstance,
    boundary: Option<IsolationBoundary>,
    relay: RelayHandle,
    poller: ReadinessPoller,
    sink: Arc<dyn LogSink>,
}

impl ScenarioContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn instance(&self) -> &DaemonInstance {
        &self.instance
    }

    pub fn boundary(&self) -> Option<&IsolationBoundary> {
        self.boundary.as_ref()
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }

    pub fn poller(&self) -> &ReadinessPoller {
        &self.poller
    }

    /// Socket address of `port` on the instance's network address.
    pub async fn address(&self, port: DaemonPort) -> Result<SocketAddr, HarnessError> {
        Ok(port.at(self.instance.address().await?))
    }

    /// Poll until `port` accepts a TCP connection.
    pub async fn await_port(&self, port: DaemonPort) -> Result<Ready, HarnessError> {
        let addr = self.address(port).await?;
        self.poller.await_tcp(addr).await
    }

    /// Poll until `port` completes a TLS handshake.
    pub async fn await_tls(&self, port: DaemonPort) -> Result<Ready, HarnessError> {
        let addr = self.address(port).await?;
        self.poller.await_tls(addr).await
    }

    /// Single dial against `port`, expected to fail.
    pub async fn assert_port_closed(&self, port: DaemonPort) -> Result<(), HarnessError> {
        let addr = self.address(port).await?;
        probe::assert_closed(addr).await
    }

    /// Whether `port` refuses a plaintext HTTP JSON-RPC request.
    pub async fn plaintext_rejected(&self, port: DaemonPort) -> Result<bool, HarnessError> {
        let addr = self.address(port).await?;
        probe::plaintext_rejected(addr, &self.config.credentials).await
    }

    /// Host port published for `port`, if any.
    pub async fn published_port(&self, port: DaemonPort) -> Result<Option<u16>, HarnessError> {
        self.instance.published_port(port).await
    }

    /// Fail if `port` has a host binding.
    pub async fn assert_not_published(&self, port: DaemonPort) -> Result<(), HarnessError> {
        match self.published_port(port).await? {
            None => Ok(()),
            Some(host_port) => Err(HarnessError::UnexpectedBinding {
                port: port.binding_key(),
                host_port,
            }),
        }
    }

    /// Bootstrap an authenticated client against the RPC port.
    pub async fn rpc_client(&self) -> Result<RpcClient, HarnessError> {
        let addr = self.address(DaemonPort::Rpc).await?;
        SecureBootstrap::new(self.poller.clone(), self.config.rpc_connect_tries)
            .bootstrap(addr, &self.config.credentials)
            .await
    }

    /// Abort the relay, remove the container, then remove the network.
    ///
    /// Every step is attempted even if an earlier one fails. Safe to call
    /// more than once.
    pub async fn teardown(&self) -> Result<(), HarnessError> {
        self.relay.abort();
        let stopped = self.instance.stop().await;
        let closed = match &self.boundary {
            Some(boundary) => boundary.close().await,
            None => Ok(()),
        };

        match (stopped, closed) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(container), Err(network)) => Err(container.with_teardown(Err(network))),
        }
    }
}

impl std::fmt::Debug for ScenarioContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioContext")
            .field("name", &self.name)
            .field("instance", &self.instance)
            .field("boundary", &self.boundary)
            .finish_non_exhaustive()
    }
}
