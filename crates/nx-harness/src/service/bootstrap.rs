//! Secure bootstrap of an RPC session from a harvested certificate.
//!
//! The daemon generates a self-signed certificate on first start, so there is
//! no trust anchor to configure up front. The bootstrap trusts whatever the
//! live instance presents on one unverified handshake, and pins exactly that
//! for the authenticated session that follows.

use std::net::SocketAddr;

use tracing::info;

use super::{probe, ReadinessPoller};
use crate::domain::{CertificateBundle, ConnectionConfig, Credentials, HarnessError};
use crate::rpc::RpcClient;
use crate::transport::insecure_client_config;

/// Builds authenticated RPC clients against a freshly started daemon.
#[derive(Debug, Clone)]
pub struct SecureBootstrap {
    poller: ReadinessPoller,
    connect_tries: u32,
}

impl SecureBootstrap {
    /// `connect_tries` is passed to [`RpcClient::connect`] and must be at least 1.
    pub fn new(poller: ReadinessPoller, connect_tries: u32) -> Self {
        Self {
            poller,
            connect_tries,
        }
    }

    /// Handshake once without verification and PEM-encode the peer chain.
    ///
    /// The harvesting connection is closed before returning.
    pub async fn harvest(addr: SocketAddr) -> Result<CertificateBundle, HarnessError> {
        let harvest_err = |reason: String| HarnessError::Harvest {
            target: addr.to_string(),
            reason,
        };

        let config = insecure_client_config().map_err(|e| harvest_err(e.to_string()))?;
        let stream = probe::dial_tls(addr, config)
            .await
            .map_err(|e| HarnessError::Handshake {
                target: addr.to_string(),
                reason: e.to_string(),
            })?;

        let (_, session) = stream.get_ref();
        let chain = session
            .peer_certificates()
            .ok_or_else(|| harvest_err("server presented no certificates".to_string()))?;
        let ders: Vec<&[u8]> = chain.iter().map(|cert| cert.as_ref()).collect();
        let bundle = CertificateBundle::from_der_chain(ders);
        drop(stream);

        if bundle.is_empty() {
            return Err(harvest_err("server presented an empty chain".to_string()));
        }
        info!(addr = %addr, certificates = bundle.len(), "harvested RPC certificate chain");
        Ok(bundle)
    }

    /// Await the port, harvest its certificate, and connect a pinned client.
    pub async fn bootstrap(
        &self,
        addr: SocketAddr,
        credentials: &Credentials,
    ) -> Result<RpcClient, HarnessError> {
        self.poller.await_tcp(addr).await?;

        let bundle = Self::harvest(addr).await?;
        let config = ConnectionConfig::new(addr, credentials.clone(), bundle)
            .disable_connect_on_new();
        let url = config.url();
        let rpc_connect_err = |reason: String| HarnessError::RpcConnect {
            target: url.clone(),
            reason,
        };

        let client = RpcClient::new(config)
            .await
            .map_err(|e| rpc_connect_err(e.to_string()))?;
        client
            .connect(self.connect_tries)
            .await
            .map_err(|e| rpc_connect_err(e.to_string()))?;

        info!(url = %url, "RPC client bootstrapped");
        Ok(client)
    }
}
