//! Harness configuration from environment variables.

use std::env;
use std::time::Duration;

use super::{Credentials, DaemonImage, RetryBudget};

/// Per-run harness settings.
///
/// Ports and the RPC endpoint path are fixed by the daemon image and are not
/// part of this configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Daemon image to launch
    pub image: DaemonImage,

    /// Network name prefix; each scenario appends its own name
    pub network_prefix: String,

    /// RPC credentials passed to the daemon and used by the client
    pub credentials: Credentials,

    /// Bind address for the daemon's RPC listener
    pub rpc_listen: String,

    /// Readiness polling budget
    pub retry: RetryBudget,

    /// Connection attempts made by the RPC client after bootstrap
    pub rpc_connect_tries: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            image: DaemonImage::new("btcd-dockertests", "latest"),
            network_prefix: "btcd_dockertests_network".to_string(),
            credentials: Credentials::new("localuser", "localuserpwd"),
            rpc_listen: "0.0.0.0".to_string(),
            retry: RetryBudget::default(),
            rpc_connect_tries: 1,
        }
    }
}

impl HarnessConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `NX_DAEMON_IMAGE`: Image repository (default: btcd-dockertests)
    /// - `NX_DAEMON_TAG`: Image tag (default: latest)
    /// - `NX_NETWORK_PREFIX`: Network name prefix (default: btcd_dockertests_network)
    /// - `NX_RPC_USER` / `NX_RPC_PASS`: RPC credentials (default: localuser / localuserpwd)
    /// - `NX_RPC_LISTEN`: RPC bind address inside the container (default: 0.0.0.0)
    /// - `NX_RETRY_MAX_WAIT_SECS`: Readiness budget in seconds (default: 60)
    /// - `NX_RPC_CONNECT_TRIES`: RPC client connection attempts (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let image = DaemonImage::new(
            env::var("NX_DAEMON_IMAGE").unwrap_or(defaults.image.repository),
            env::var("NX_DAEMON_TAG").unwrap_or(defaults.image.tag),
        );

        let credentials = Credentials::new(
            env::var("NX_RPC_USER").unwrap_or_else(|_| defaults.credentials.user().to_string()),
            env::var("NX_RPC_PASS")
                .unwrap_or_else(|_| defaults.credentials.password().to_string()),
        );

        let retry = env::var("NX_RETRY_MAX_WAIT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| RetryBudget::with_max_elapsed(Duration::from_secs(secs)))
            .unwrap_or(defaults.retry);

        Self {
            image,
            network_prefix: env::var("NX_NETWORK_PREFIX").unwrap_or(defaults.network_prefix),
            credentials,
            rpc_listen: env::var("NX_RPC_LISTEN").unwrap_or(defaults.rpc_listen),
            retry,
            rpc_connect_tries: env::var("NX_RPC_CONNECT_TRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|tries| *tries > 0)
                .unwrap_or(defaults.rpc_connect_tries),
        }
    }

    /// Network name for one scenario: `<prefix>_<scenario>`.
    ///
    /// Stable across runs so a network leaked by a crashed run is found and
    /// purged; distinct per scenario so parallel test threads never share one.
    pub fn network_name(&self, scenario: &str) -> String {
        let scenario: String = scenario
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        format!("{}_{}", self.network_prefix, scenario)
    }
}
