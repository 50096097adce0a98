//! In-memory orchestration backend for tests.
//!
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use nx_harness::test_utils::FakeBackend;
//! use nx_harness::IsolationBoundary;
//!
//! # tokio_test_block_on(async {
//! let backend = Arc::new(FakeBackend::new());
//! let boundary = IsolationBoundary::create(backend.clone(), "nx_net").await.unwrap();
//! assert_eq!(backend.network_names(), vec!["nx_net"]);
//! boundary.close().await.unwrap();
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parking_lot::Mutex;

use crate::domain::{DaemonPort, InstanceHandle, LaunchSpec, NetworkHandle};
use crate::ports::{BackendError, LogChunk, OrchestrationBackend};

#[derive(Debug, Default)]
struct FakeNetwork {
    internal: bool,
    members: Vec<String>,
}

#[derive(Debug)]
struct FakeInstance {
    network: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    networks: BTreeMap<String, FakeNetwork>,
    instances: BTreeMap<String, FakeInstance>,
    launched: Vec<LaunchSpec>,
    calls: Vec<&'static str>,
    next_id: u64,
}

#[derive(Debug, Clone)]
enum Logs {
    Chunks(Vec<LogChunk>),
    Pending,
}

/// Backend that keeps networks and containers in memory.
///
/// Enforces the same rules as the real engine where the harness depends on
/// them: a network with members cannot be removed, removing a missing
/// resource is `NotFound`, and a detached container has no address.
#[derive(Debug)]
pub struct FakeBackend {
    state: Mutex<State>,
    address: IpAddr,
    published: HashMap<DaemonPort, u16>,
    logs: Logs,
    fail_create_network: Option<String>,
    fail_remove_network: Option<String>,
    fail_start: Option<String>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            published: HashMap::new(),
            logs: Logs::Chunks(Vec::new()),
            fail_create_network: None,
            fail_remove_network: None,
            fail_start: None,
        }
    }

    /// Address reported for every instance on a network.
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = address;
        self
    }

    /// Output every started instance produces before its stream ends.
    pub fn with_logs(mut self, chunks: Vec<LogChunk>) -> Self {
        self.logs = Logs::Chunks(chunks);
        self
    }

    /// Log streams that never yield and never end.
    pub fn with_pending_logs(mut self) -> Self {
        self.logs = Logs::Pending;
        self
    }

    /// Publish `port` on `host_port` for every instance.
    pub fn publish(mut self, port: DaemonPort, host_port: u16) -> Self {
        self.published.insert(port, host_port);
        self
    }

    /// Seed a network left behind by an earlier run.
    pub fn with_stale_network(self, name: &str, members: &[&str]) -> Self {
        {
            let mut state = self.state.lock();
            state.networks.insert(
                name.to_string(),
                FakeNetwork {
                    internal: true,
                    members: members.iter().map(|m| m.to_string()).collect(),
                },
            );
        }
        self
    }

    pub fn fail_create_network(mut self, reason: &str) -> Self {
        self.fail_create_network = Some(reason.to_string());
        self
    }

    pub fn fail_remove_network(mut self, reason: &str) -> Self {
        self.fail_remove_network = Some(reason.to_string());
        self
    }

    pub fn fail_start(mut self, reason: &str) -> Self {
        self.fail_start = Some(reason.to_string());
        self
    }

    /// Names of existing networks, sorted.
    pub fn network_names(&self) -> Vec<String> {
        self.state.lock().networks.keys().cloned().collect()
    }

    /// Ids of existing containers, sorted.
    pub fn instance_ids(&self) -> Vec<String> {
        self.state.lock().instances.keys().cloned().collect()
    }

    /// Most recent launch request.
    pub fn last_spec(&self) -> Option<LaunchSpec> {
        self.state.lock().launched.last().cloned()
    }

    /// Number of calls made to one backend operation.
    pub fn count_calls(&self, operation: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| **c == operation)
            .count()
    }

    /// Drop a network behind the harness's back.
    pub fn forget_network(&self, name: &str) {
        self.state.lock().networks.remove(name);
    }

    /// Drop a container behind the harness's back.
    pub fn forget_instance(&self, instance: &InstanceHandle) {
        let mut state = self.state.lock();
        state.instances.remove(instance.id());
        for network in state.networks.values_mut() {
            network.members.retain(|m| m != instance.id());
        }
    }

    /// Attach a container id the harness does not know about.
    pub fn join_network(&self, network: &str, id: &str) {
        if let Some(network) = self.state.lock().networks.get_mut(network) {
            network.members.push(id.to_string());
        }
    }

    fn record(&self, operation: &'static str) -> parking_lot::MutexGuard<'_, State> {
        let mut state = self.state.lock();
        state.calls.push(operation);
        state
    }
}

fn not_found(kind: &str, name: &str) -> BackendError {
    BackendError::NotFound(format!("{} {}", kind, name))
}

#[async_trait]
impl OrchestrationBackend for FakeBackend {
    async fn ping(&self) -> Result<(), BackendError> {
        drop(self.record("ping"));
        Ok(())
    }

    async fn create_network(
        &self,
        name: &str,
        internal: bool,
    ) -> Result<NetworkHandle, BackendError> {
        let mut state = self.record("create_network");
        if let Some(reason) = &self.fail_create_network {
            return Err(BackendError::Api {
                status: 500,
                message: reason.clone(),
            });
        }
        if state.networks.contains_key(name) {
            return Err(BackendError::Conflict(format!("network {} already exists", name)));
        }
        state.networks.insert(
            name.to_string(),
            FakeNetwork {
                internal,
                members: Vec::new(),
            },
        );
        Ok(NetworkHandle::new(name, internal))
    }

    async fn list_networks(&self, name: &str) -> Result<Vec<NetworkHandle>, BackendError> {
        let state = self.record("list_networks");
        Ok(state
            .networks
            .get(name)
            .map(|n| NetworkHandle::new(name, n.internal))
            .into_iter()
            .collect())
    }

    async fn network_members(
        &self,
        network: &NetworkHandle,
    ) -> Result<Vec<InstanceHandle>, BackendError> {
        let state = self.record("network_members");
        let found = state
            .networks
            .get(network.name())
            .ok_or_else(|| not_found("network", network.name()))?;
        Ok(found.members.iter().map(InstanceHandle::new).collect())
    }

    async fn attach(
        &self,
        network: &NetworkHandle,
        instance: &InstanceHandle,
    ) -> Result<(), BackendError> {
        let mut state = self.record("attach");
        if !state.instances.contains_key(instance.id()) {
            return Err(not_found("container", instance.id()));
        }
        let found = state
            .networks
            .get_mut(network.name())
            .ok_or_else(|| not_found("network", network.name()))?;
        if !found.members.iter().any(|m| m == instance.id()) {
            found.members.push(instance.id().to_string());
        }
        if let Some(attached) = state.instances.get_mut(instance.id()) {
            attached.network = Some(network.name().to_string());
        }
        Ok(())
    }

    async fn detach(
        &self,
        network: &NetworkHandle,
        instance: &InstanceHandle,
    ) -> Result<(), BackendError> {
        let mut state = self.record("detach");
        let found = state
            .networks
            .get_mut(network.name())
            .ok_or_else(|| not_found("network", network.name()))?;
        let before = found.members.len();
        found.members.retain(|m| m != instance.id());
        if found.members.len() == before {
            return Err(not_found("endpoint", instance.id()));
        }
        if let Some(attached) = state.instances.get_mut(instance.id()) {
            attached.network = None;
        }
        Ok(())
    }

    async fn remove_network(&self, network: &NetworkHandle) -> Result<(), BackendError> {
        let mut state = self.record("remove_network");
        if let Some(reason) = &self.fail_remove_network {
            return Err(BackendError::Api {
                status: 500,
                message: reason.clone(),
            });
        }
        let found = state
            .networks
            .get(network.name())
            .ok_or_else(|| not_found("network", network.name()))?;
        if !found.members.is_empty() {
            return Err(BackendError::Conflict(format!(
                "network {} has active endpoints",
                network.name()
            )));
        }
        state.networks.remove(network.name());
        Ok(())
    }

    async fn start(&self, spec: &LaunchSpec) -> Result<InstanceHandle, BackendError> {
        let mut state = self.record("start");
        state.launched.push(spec.clone());
        if let Some(reason) = &self.fail_start {
            return Err(BackendError::NotFound(reason.clone()));
        }

        state.next_id += 1;
        let id = format!("{:064x}", state.next_id);
        let network = match &spec.network {
            Some(network) => {
                let found = state
                    .networks
                    .get_mut(network.name())
                    .ok_or_else(|| not_found("network", network.name()))?;
                found.members.push(id.clone());
                Some(network.name().to_string())
            }
            None => None,
        };
        state.instances.insert(id.clone(), FakeInstance { network });
        Ok(InstanceHandle::new(id))
    }

    async fn address_in(
        &self,
        instance: &InstanceHandle,
        network: &NetworkHandle,
    ) -> Result<Option<IpAddr>, BackendError> {
        let state = self.record("address_in");
        let found = state
            .instances
            .get(instance.id())
            .ok_or_else(|| not_found("container", instance.id()))?;
        Ok((found.network.as_deref() == Some(network.name())).then_some(self.address))
    }

    async fn published_port(
        &self,
        instance: &InstanceHandle,
        port: DaemonPort,
    ) -> Result<Option<u16>, BackendError> {
        let state = self.record("published_port");
        if !state.instances.contains_key(instance.id()) {
            return Err(not_found("container", instance.id()));
        }
        Ok(self.published.get(&port).copied())
    }

    async fn remove_instance(&self, instance: &InstanceHandle) -> Result<(), BackendError> {
        let mut state = self.record("remove_instance");
        if state.instances.remove(instance.id()).is_none() {
            return Err(not_found("container", instance.id()));
        }
        for network in state.networks.values_mut() {
            network.members.retain(|m| m != instance.id());
        }
        Ok(())
    }

    fn logs(
        &self,
        _instance: &InstanceHandle,
    ) -> BoxStream<'static, Result<LogChunk, BackendError>> {
        drop(self.record("logs"));
        match &self.logs {
            Logs::Chunks(chunks) => stream::iter(chunks.clone().into_iter().map(Ok)).boxed(),
            Logs::Pending => stream::pending().boxed(),
        }
    }
}
