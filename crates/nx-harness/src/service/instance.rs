//! Daemon container lifecycle.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{
    DaemonImage, DaemonPort, HarnessError, InstanceHandle, LaunchSpec, NetworkHandle,
};
use crate::ports::OrchestrationBackend;

/// Running daemon container owned by one scenario.
///
/// [`stop`](Self::stop) removes the container and is idempotent. An instance
/// dropped without being stopped is removed by a best-effort background task.
pub struct DaemonInstance {
    backend: Arc<dyn OrchestrationBackend>,
    handle: InstanceHandle,
    image: DaemonImage,
    network: Option<NetworkHandle>,
    stopped: AtomicBool,
}

impl DaemonInstance {
    /// Create and start a container from `spec`.
    pub async fn start(
        backend: Arc<dyn OrchestrationBackend>,
        spec: LaunchSpec,
    ) -> Result<Self, HarnessError> {
        let handle = backend
            .start(&spec)
            .await
            .map_err(|e| HarnessError::InstanceStart {
                image: spec.image.reference(),
                reason: e.to_string(),
            })?;

        info!(
            container = %handle,
            image = %spec.image.reference(),
            network = spec.network.as_ref().map_or("none", |n| n.name()),
            args = ?spec.args,
            "started daemon"
        );

        Ok(Self {
            backend,
            handle,
            image: spec.image,
            network: spec.network,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn handle(&self) -> &InstanceHandle {
        &self.handle
    }

    pub fn image(&self) -> &DaemonImage {
        &self.image
    }

    /// Network the instance was started on; `None` when it runs without one.
    pub fn network(&self) -> Option<&NetworkHandle> {
        self.network.as_ref()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// IP of the instance inside the network it was started on.
    pub async fn address(&self) -> Result<IpAddr, HarnessError> {
        match &self.network {
            Some(network) => self.address_in(network).await,
            None => Err(HarnessError::AddressUnavailable {
                instance: self.handle.to_string(),
                network: "none".to_string(),
            }),
        }
    }

    /// IP of the instance inside `network`.
    pub async fn address_in(&self, network: &NetworkHandle) -> Result<IpAddr, HarnessError> {
        self.backend
            .address_in(&self.handle, network)
            .await
            .map_err(|e| self.inspect_err(e))?
            .ok_or_else(|| HarnessError::AddressUnavailable {
                instance: self.handle.to_string(),
                network: network.name().to_string(),
            })
    }

    /// Host port published for `port`, if any.
    pub async fn published_port(&self, port: DaemonPort) -> Result<Option<u16>, HarnessError> {
        self.backend
            .published_port(&self.handle, port)
            .await
            .map_err(|e| self.inspect_err(e))
    }

    /// Force-remove the container and its volumes.
    ///
    /// A second call is a no-op. A container the backend no longer knows
    /// counts as removed.
    pub async fn stop(&self) -> Result<(), HarnessError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!(container = %self.handle, "container already removed");
            return Ok(());
        }

        match self.backend.remove_instance(&self.handle).await {
            Ok(()) => {
                info!(container = %self.handle, "removed container");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(container = %self.handle, "container was already gone");
                Ok(())
            }
            Err(e) => {
                self.stopped.store(false, Ordering::SeqCst);
                Err(HarnessError::Teardown {
                    resource: format!("container {}", self.handle),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn inspect_err(&self, e: impl std::fmt::Display) -> HarnessError {
        HarnessError::Inspect {
            instance: self.handle.to_string(),
            reason: e.to_string(),
        }
    }
}

impl Drop for DaemonInstance {
    fn drop(&mut self) {
        if self.is_stopped() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(
                    container = %self.handle,
                    "container dropped while running, removing in background"
                );
                let backend = self.backend.clone();
                let handle = self.handle.clone();
                runtime.spawn(async move {
                    if let Err(e) = backend.remove_instance(&handle).await {
                        if !e.is_not_found() {
                            warn!(
                                container = %handle,
                                error = %e,
                                "background container removal failed"
                            );
                        }
                    }
                });
            }
            Err(_) => warn!(
                container = %self.handle,
                "container dropped outside a runtime and was leaked"
            ),
        }
    }
}

impl std::fmt::Debug for DaemonInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonInstance")
            .field("handle", &self.handle)
            .field("image", &self.image)
            .field("network", &self.network)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
