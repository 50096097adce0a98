//! Core value types shared by every layer of the harness.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

// =============================================================================
// FIXED DAEMON INTERFACE
// =============================================================================

/// Peer-to-peer listener port baked into the daemon image.
pub const P2P_PORT: u16 = 8333;

/// RPC listener port baked into the daemon image.
pub const RPC_PORT: u16 = 8334;

/// Websocket sub-endpoint served by the RPC listener.
pub const RPC_ENDPOINT: &str = "ws";

/// One of the two ports the daemon image exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DaemonPort {
    /// Peer-to-peer protocol listener.
    PeerToPeer,
    /// TLS-only RPC listener.
    Rpc,
}

impl DaemonPort {
    /// Port number inside the container.
    pub fn number(self) -> u16 {
        match self {
            Self::PeerToPeer => P2P_PORT,
            Self::Rpc => RPC_PORT,
        }
    }

    /// Key used by the container engine for this port's bindings (`8334/tcp`).
    pub fn binding_key(self) -> String {
        format!("{}/tcp", self.number())
    }

    /// Socket address of this port on the given container IP.
    pub fn at(self, ip: IpAddr) -> SocketAddr {
        SocketAddr::new(ip, self.number())
    }
}

impl fmt::Display for DaemonPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerToPeer => write!(f, "P2P port {}", P2P_PORT),
            Self::Rpc => write!(f, "RPC port {}", RPC_PORT),
        }
    }
}

// =============================================================================
// IMAGE & LAUNCH
// =============================================================================

/// A named, tagged daemon image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DaemonImage {
    /// Repository name (e.g. `btcd-dockertests`)
    pub repository: String,
    /// Tag (e.g. `latest`)
    pub tag: String,
}

impl DaemonImage {
    /// Create an image reference.
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// `repository:tag` reference understood by the container engine.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// RPC username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    password: String,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// RPC username.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// RPC password.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything the backend needs to start one daemon instance.
#[derive(Clone, Debug)]
pub struct LaunchSpec {
    /// Image to run
    pub image: DaemonImage,
    /// Network to attach to; `None` runs without any network driver
    pub network: Option<NetworkHandle>,
    /// Daemon command-line arguments
    pub args: Vec<String>,
}

impl LaunchSpec {
    /// Launch the image with default daemon options and no network.
    pub fn new(image: DaemonImage) -> Self {
        Self {
            image,
            network: None,
            args: Vec::new(),
        }
    }

    /// Attach the instance to `network`.
    #[must_use]
    pub fn on_network(mut self, network: NetworkHandle) -> Self {
        self.network = Some(network);
        self
    }

    /// Enable the RPC listener with the given credentials and bind address.
    #[must_use]
    pub fn with_rpc(mut self, credentials: &Credentials, listen: &str) -> Self {
        self.args.extend(rpc_flags(credentials, listen));
        self
    }
}

/// Daemon flags that turn on the RPC listener.
pub fn rpc_flags(credentials: &Credentials, listen: &str) -> Vec<String> {
    vec![
        format!("--rpcuser={}", credentials.user()),
        format!("--rpcpass={}", credentials.password()),
        format!("--rpclisten={}", listen),
    ]
}

// =============================================================================
// BACKEND HANDLES
// =============================================================================

/// Handle to a virtual network created by the orchestration backend.
///
/// Networks are addressed by name; the name is fixed per scenario so a network
/// leaked by a crashed run can be found and purged.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NetworkHandle {
    name: String,
    internal: bool,
}

impl NetworkHandle {
    /// Create a handle.
    pub fn new(name: impl Into<String>, internal: bool) -> Self {
        Self {
            name: name.into(),
            internal,
        }
    }

    /// Network name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the network has no route outside the backend.
    pub fn is_internal(&self) -> bool {
        self.internal
    }
}

/// Handle to a running daemon container.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    id: String,
}

impl InstanceHandle {
    /// Create a handle from a backend identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Backend identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// First 12 characters of the identifier, for log lines.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(12)
            .map_or(self.id.len(), |(i, _)| i);
        &self.id[..end]
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_reference() {
        let image = DaemonImage::new("btcd-dockertests", "latest");
        assert_eq!(image.reference(), "btcd-dockertests:latest");
    }

    #[test]
    fn test_rpc_flags_match_daemon_cli() {
        let creds = Credentials::new("localuser", "localuserpwd");
        assert_eq!(
            rpc_flags(&creds, "0.0.0.0"),
            vec![
                "--rpcuser=localuser",
                "--rpcpass=localuserpwd",
                "--rpclisten=0.0.0.0",
            ]
        );
    }

    #[test]
    fn test_default_launch_has_no_args_and_no_network() {
        let spec = LaunchSpec::new(DaemonImage::new("img", "t"));
        assert!(spec.args.is_empty());
        assert!(spec.network.is_none());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("alice", "hunter2");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_port_binding_keys() {
        assert_eq!(DaemonPort::Rpc.binding_key(), "8334/tcp");
        assert_eq!(DaemonPort::PeerToPeer.binding_key(), "8333/tcp");
    }

    #[test]
    fn test_short_id() {
        let handle = InstanceHandle::new("0123456789abcdef0123");
        assert_eq!(handle.short_id(), "0123456789ab");
        assert_eq!(InstanceHandle::new("abc").short_id(), "abc");
    }
}
