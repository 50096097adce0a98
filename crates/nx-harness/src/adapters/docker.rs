//! Docker Engine adapter for [`OrchestrationBackend`].
//!
//! Talks to the local daemon through bollard. Networks are addressed by name,
//! containers by id.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::models::{ContainerInspectResponse, EndpointSettings, HostConfig};
use bollard::network::{
    ConnectNetworkOptions, CreateNetworkOptions, DisconnectNetworkOptions, InspectNetworkOptions,
    ListNetworksOptions,
};
use bollard::Docker;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, info};

use crate::domain::{DaemonPort, HarnessError, InstanceHandle, LaunchSpec, NetworkHandle};
use crate::ports::{BackendError, LogChunk, OrchestrationBackend};

/// Network mode for a container started without a network.
const NO_NETWORK: &str = "none";

/// Driver for created networks.
const NETWORK_DRIVER: &str = "bridge";

/// [`OrchestrationBackend`] backed by the local Docker Engine.
#[derive(Debug, Clone)]
pub struct DockerBackend {
    docker: Docker,
}

impl DockerBackend {
    /// Connect with the local defaults (`DOCKER_HOST` or the local socket)
    /// and verify the engine answers.
    pub async fn connect() -> Result<Self, HarnessError> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            HarnessError::BackendUnavailable {
                reason: e.to_string(),
            }
        })?;
        Self::from_client(docker).await
    }

    /// Wrap an existing client after a ping.
    pub async fn from_client(docker: Docker) -> Result<Self, HarnessError> {
        let backend = Self { docker };
        backend
            .ping()
            .await
            .map_err(|e| HarnessError::BackendUnavailable {
                reason: e.to_string(),
            })?;
        info!("connected to Docker engine");
        Ok(backend)
    }

    async fn inspect(
        &self,
        instance: &InstanceHandle,
    ) -> Result<ContainerInspectResponse, BackendError> {
        self.docker
            .inspect_container(instance.id(), None::<InspectContainerOptions>)
            .await
            .map_err(map_error)
    }

    async fn remove_container(&self, id: &str) -> Result<(), BackendError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_error)
    }
}

#[async_trait]
impl OrchestrationBackend for DockerBackend {
    async fn ping(&self) -> Result<(), BackendError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| BackendError::Unavailable(e.to_string()))
    }

    async fn create_network(
        &self,
        name: &str,
        internal: bool,
    ) -> Result<NetworkHandle, BackendError> {
        self.docker
            .create_network(CreateNetworkOptions {
                name,
                internal,
                check_duplicate: true,
                driver: NETWORK_DRIVER,
                ..Default::default()
            })
            .await
            .map_err(map_error)?;
        Ok(NetworkHandle::new(name, internal))
    }

    async fn list_networks(&self, name: &str) -> Result<Vec<NetworkHandle>, BackendError> {
        let mut filters = HashMap::new();
        filters.insert("name", vec![name]);
        let networks = self
            .docker
            .list_networks(Some(ListNetworksOptions { filters }))
            .await
            .map_err(map_error)?;

        // The engine's name filter matches substrings.
        Ok(networks
            .into_iter()
            .filter(|n| n.name.as_deref() == Some(name))
            .map(|n| NetworkHandle::new(name, n.internal.unwrap_or(false)))
            .collect())
    }

    async fn network_members(
        &self,
        network: &NetworkHandle,
    ) -> Result<Vec<InstanceHandle>, BackendError> {
        let inspected = self
            .docker
            .inspect_network(network.name(), None::<InspectNetworkOptions<String>>)
            .await
            .map_err(map_error)?;
        Ok(inspected
            .containers
            .unwrap_or_default()
            .into_keys()
            .map(InstanceHandle::new)
            .collect())
    }

    async fn attach(
        &self,
        network: &NetworkHandle,
        instance: &InstanceHandle,
    ) -> Result<(), BackendError> {
        self.docker
            .connect_network(
                network.name(),
                ConnectNetworkOptions {
                    container: instance.id(),
                    endpoint_config: EndpointSettings::default(),
                },
            )
            .await
            .map_err(map_error)
    }

    async fn detach(
        &self,
        network: &NetworkHandle,
        instance: &InstanceHandle,
    ) -> Result<(), BackendError> {
        self.docker
            .disconnect_network(
                network.name(),
                DisconnectNetworkOptions {
                    container: instance.id(),
                    force: true,
                },
            )
            .await
            .map_err(map_error)
    }

    async fn remove_network(&self, network: &NetworkHandle) -> Result<(), BackendError> {
        self.docker
            .remove_network(network.name())
            .await
            .map_err(map_error)
    }

    async fn start(&self, spec: &LaunchSpec) -> Result<InstanceHandle, BackendError> {
        let network_mode = spec
            .network
            .as_ref()
            .map_or(NO_NETWORK.to_string(), |n| n.name().to_string());
        let config = Config {
            image: Some(spec.image.reference()),
            cmd: (!spec.args.is_empty()).then(|| spec.args.clone()),
            host_config: Some(HostConfig {
                network_mode: Some(network_mode),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(map_error)?;

        if let Err(e) = self
            .docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
        {
            if let Err(cleanup) = self.remove_container(&created.id).await {
                debug!(
                    container = %created.id,
                    error = %cleanup,
                    "could not remove unstarted container"
                );
            }
            return Err(map_error(e));
        }

        Ok(InstanceHandle::new(created.id))
    }

    async fn address_in(
        &self,
        instance: &InstanceHandle,
        network: &NetworkHandle,
    ) -> Result<Option<IpAddr>, BackendError> {
        let inspected = self.inspect(instance).await?;
        endpoint_ip(&inspected, network.name())
    }

    async fn published_port(
        &self,
        instance: &InstanceHandle,
        port: DaemonPort,
    ) -> Result<Option<u16>, BackendError> {
        let inspected = self.inspect(instance).await?;
        Ok(host_port(&inspected, port))
    }

    async fn remove_instance(&self, instance: &InstanceHandle) -> Result<(), BackendError> {
        self.remove_container(instance.id()).await
    }

    fn logs(
        &self,
        instance: &InstanceHandle,
    ) -> BoxStream<'static, Result<LogChunk, BackendError>> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Default::default()
        };
        self.docker
            .logs(instance.id(), Some(options))
            .map(|item| item.map(log_chunk).map_err(map_error))
            .boxed()
    }
}

fn log_chunk(output: LogOutput) -> LogChunk {
    match output {
        LogOutput::StdErr { message } => LogChunk::stderr(message.to_vec()),
        other => LogChunk::stdout(other.into_bytes().to_vec()),
    }
}

/// IP address of the container's endpoint in `network`, if it has one.
fn endpoint_ip(
    inspected: &ContainerInspectResponse,
    network: &str,
) -> Result<Option<IpAddr>, BackendError> {
    let ip = inspected
        .network_settings
        .as_ref()
        .and_then(|settings| settings.networks.as_ref())
        .and_then(|networks| networks.get(network))
        .and_then(|endpoint| endpoint.ip_address.as_deref())
        .filter(|ip| !ip.is_empty());

    ip.map(|ip| {
        ip.parse()
            .map_err(|e| BackendError::Transport(format!("invalid endpoint address {ip}: {e}")))
    })
    .transpose()
}

/// First host port bound to `port`, if the container publishes it.
fn host_port(inspected: &ContainerInspectResponse, port: DaemonPort) -> Option<u16> {
    inspected
        .network_settings
        .as_ref()?
        .ports
        .as_ref()?
        .get(&port.binding_key())?
        .as_ref()?
        .iter()
        .find_map(|binding| binding.host_port.as_deref()?.parse().ok())
}

fn map_error(e: DockerError) -> BackendError {
    match e {
        DockerError::DockerResponseServerError {
            status_code: 404,
            message,
        } => BackendError::NotFound(message),
        DockerError::DockerResponseServerError {
            status_code: 409,
            message,
        } => BackendError::Conflict(message),
        DockerError::DockerResponseServerError {
            status_code,
            message,
        } => BackendError::Api {
            status: status_code,
            message,
        },
        other => BackendError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{NetworkSettings, PortBinding};

    fn inspected(
        networks: Vec<(&str, &str)>,
        ports: Vec<(&str, Option<Vec<&str>>)>,
    ) -> ContainerInspectResponse {
        let networks = networks
            .into_iter()
            .map(|(name, ip)| {
                (
                    name.to_string(),
                    EndpointSettings {
                        ip_address: Some(ip.to_string()),
                        ..Default::default()
                    },
                )
            })
            .collect();
        let ports = ports
            .into_iter()
            .map(|(key, bindings)| {
                (
                    key.to_string(),
                    bindings.map(|hosts| {
                        hosts
                            .into_iter()
                            .map(|host| PortBinding {
                                host_ip: Some("0.0.0.0".to_string()),
                                host_port: Some(host.to_string()),
                            })
                            .collect()
                    }),
                )
            })
            .collect();
        ContainerInspectResponse {
            network_settings: Some(NetworkSettings {
                networks: Some(networks),
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_ip_in_named_network() {
        let response = inspected(vec![("nx_net", "172.18.0.2")], vec![]);
        assert_eq!(
            endpoint_ip(&response, "nx_net").unwrap(),
            Some("172.18.0.2".parse().unwrap())
        );
        assert_eq!(endpoint_ip(&response, "other").unwrap(), None);
    }

    #[test]
    fn test_empty_endpoint_ip_means_no_address() {
        let response = inspected(vec![("nx_net", "")], vec![]);
        assert_eq!(endpoint_ip(&response, "nx_net").unwrap(), None);
    }

    #[test]
    fn test_malformed_endpoint_ip_is_an_error() {
        let response = inspected(vec![("nx_net", "not-an-ip")], vec![]);
        assert!(matches!(
            endpoint_ip(&response, "nx_net"),
            Err(BackendError::Transport(_))
        ));
    }

    #[test]
    fn test_exposed_but_unpublished_port_has_no_host_port() {
        let response = inspected(vec![], vec![("8334/tcp", None), ("8333/tcp", Some(vec![]))]);
        assert_eq!(host_port(&response, DaemonPort::Rpc), None);
        assert_eq!(host_port(&response, DaemonPort::PeerToPeer), None);
    }

    #[test]
    fn test_published_port_is_found() {
        let response = inspected(vec![], vec![("8334/tcp", Some(vec!["49153"]))]);
        assert_eq!(host_port(&response, DaemonPort::Rpc), Some(49153));
    }

    #[test]
    fn test_inspect_without_network_settings() {
        let response = ContainerInspectResponse::default();
        assert_eq!(host_port(&response, DaemonPort::Rpc), None);
        assert_eq!(endpoint_ip(&response, "nx_net").unwrap(), None);
    }

    #[test]
    fn test_error_mapping_by_status() {
        let server = |status_code: u16| DockerError::DockerResponseServerError {
            status_code,
            message: "msg".to_string(),
        };
        assert_eq!(map_error(server(404)), BackendError::NotFound("msg".into()));
        assert_eq!(map_error(server(409)), BackendError::Conflict("msg".into()));
        assert_eq!(
            map_error(server(500)),
            BackendError::Api {
                status: 500,
                message: "msg".into()
            }
        );
    }

    #[test]
    fn test_log_output_mapping() {
        let err = log_chunk(LogOutput::StdErr {
            message: "boom\n".into(),
        });
        assert_eq!(err, LogChunk::stderr("boom\n"));

        let out = log_chunk(LogOutput::StdOut {
            message: "ok\n".into(),
        });
        assert_eq!(out, LogChunk::stdout("ok\n"));
    }
}
