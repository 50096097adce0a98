//! Ephemeral internal network that isolates one scenario's daemon.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{HarnessError, InstanceHandle, NetworkHandle};
use crate::ports::{BackendError, OrchestrationBackend};

/// Owned network. Closed explicitly with [`close`](Self::close); a boundary
/// dropped while still open is removed by a best-effort background task.
pub struct IsolationBoundary {
    backend: Arc<dyn OrchestrationBackend>,
    handle: NetworkHandle,
    closed: AtomicBool,
}

impl IsolationBoundary {
    /// Create an internal network named `name`.
    ///
    /// A network left behind under the same name by an earlier run is purged
    /// first.
    pub async fn create(
        backend: Arc<dyn OrchestrationBackend>,
        name: &str,
    ) -> Result<Self, HarnessError> {
        let create_err = |reason: String| HarnessError::NetworkCreate {
            name: name.to_string(),
            reason,
        };

        let stale = backend
            .list_networks(name)
            .await
            .map_err(|e| create_err(e.to_string()))?;
        for network in stale {
            info!(network = %network.name(), "removing stale network");
            purge_network(backend.as_ref(), &network)
                .await
                .map_err(|e| create_err(format!("stale network could not be removed: {}", e)))?;
        }

        let handle = backend
            .create_network(name, true)
            .await
            .map_err(|e| create_err(e.to_string()))?;
        info!(network = %handle.name(), "created internal network");

        Ok(Self {
            backend,
            handle,
            closed: AtomicBool::new(false),
        })
    }

    pub fn handle(&self) -> &NetworkHandle {
        &self.handle
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Attach a running instance.
    pub async fn attach(&self, instance: &InstanceHandle) -> Result<(), HarnessError> {
        self.backend
            .attach(&self.handle, instance)
            .await
            .map_err(|e| HarnessError::NetworkMembership {
                action: "attach",
                network: self.handle.name().to_string(),
                instance: instance.to_string(),
                reason: e.to_string(),
            })
    }

    /// Force-detach an instance.
    pub async fn detach(&self, instance: &InstanceHandle) -> Result<(), HarnessError> {
        self.backend
            .detach(&self.handle, instance)
            .await
            .map_err(|e| HarnessError::NetworkMembership {
                action: "detach",
                network: self.handle.name().to_string(),
                instance: instance.to_string(),
                reason: e.to_string(),
            })
    }

    /// Remove the network, detaching anything still attached.
    ///
    /// A second call is a no-op. A network the backend no longer knows counts
    /// as removed.
    pub async fn close(&self) -> Result<(), HarnessError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!(network = %self.handle.name(), "network already closed");
            return Ok(());
        }

        match purge_network(self.backend.as_ref(), &self.handle).await {
            Ok(()) => {
                info!(network = %self.handle.name(), "removed network");
                Ok(())
            }
            Err(e) => {
                self.closed.store(false, Ordering::SeqCst);
                Err(HarnessError::Teardown {
                    resource: format!("network {}", self.handle.name()),
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl Drop for IsolationBoundary {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        let name = self.handle.name().to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(network = %name, "network dropped while open, removing in background");
                let backend = self.backend.clone();
                let handle = self.handle.clone();
                runtime.spawn(async move {
                    if let Err(e) = purge_network(backend.as_ref(), &handle).await {
                        warn!(
                            network = %handle.name(),
                            error = %e,
                            "background network removal failed"
                        );
                    }
                });
            }
            Err(_) => warn!(network = %name, "network dropped outside a runtime and was leaked"),
        }
    }
}

impl std::fmt::Debug for IsolationBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolationBoundary")
            .field("handle", &self.handle)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Detach every member, then remove the network. Missing resources are fine.
async fn purge_network(
    backend: &dyn OrchestrationBackend,
    network: &NetworkHandle,
) -> Result<(), BackendError> {
    let members = match backend.network_members(network).await {
        Ok(members) => members,
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(e),
    };
    for member in &members {
        match backend.detach(network, member).await {
            Ok(()) => debug!(network = %network.name(), container = %member, "detached container"),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
    }
    match backend.remove_network(network).await {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
