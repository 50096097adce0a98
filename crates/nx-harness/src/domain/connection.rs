use std::net::SocketAddr;

use super::{CertificateBundle, Credentials, RPC_ENDPOINT};

/// Immutable description of one authenticated RPC session.
///
/// Consumed by [`RpcClient::new`](crate::rpc::RpcClient::new). The harness
/// always builds it with `disable_connect_on_new` set and connects explicitly.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    host: SocketAddr,
    endpoint: String,
    credentials: Credentials,
    certificates: CertificateBundle,
    disable_connect_on_new: bool,
}

impl ConnectionConfig {
    /// Config for `host` on the default websocket endpoint.
    ///
    /// Connects during construction unless
    /// [`disable_connect_on_new`](Self::disable_connect_on_new) is called.
    pub fn new(
        host: SocketAddr,
        credentials: Credentials,
        certificates: CertificateBundle,
    ) -> Self {
        Self {
            host,
            endpoint: RPC_ENDPOINT.to_string(),
            credentials,
            certificates,
            disable_connect_on_new: false,
        }
    }

    /// Use a different sub-endpoint path.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Defer connecting until `RpcClient::connect` is called.
    #[must_use]
    pub fn disable_connect_on_new(mut self) -> Self {
        self.disable_connect_on_new = true;
        self
    }

    pub fn host(&self) -> SocketAddr {
        self.host
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn certificates(&self) -> &CertificateBundle {
        &self.certificates
    }

    pub fn connects_on_new(&self) -> bool {
        !self.disable_connect_on_new
    }

    /// `wss://host:port/endpoint`
    pub fn url(&self) -> String {
        format!(
            "wss://{}/{}",
            self.host,
            self.endpoint.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new(
            "172.18.0.2:8334".parse().unwrap(),
            Credentials::new("u", "p"),
            CertificateBundle::default(),
        )
    }

    #[test]
    fn test_url_uses_websocket_endpoint() {
        assert_eq!(config().url(), "wss://172.18.0.2:8334/ws");
    }

    #[test]
    fn test_endpoint_leading_slash_is_tolerated() {
        assert_eq!(
            config().with_endpoint("/rpc").url(),
            "wss://172.18.0.2:8334/rpc"
        );
    }

    #[test]
    fn test_connect_on_new_defaults_on() {
        assert!(config().connects_on_new());
        assert!(!config().disable_connect_on_new().connects_on_new());
    }
}
