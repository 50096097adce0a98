//! Harness error taxonomy.
//!
//! Every variant is fatal for the scenario that raised it. The only failures
//! recovered locally are the dial attempts inside the readiness poller's
//! budget, which never surface here.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while orchestrating a scenario.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Orchestration backend cannot be reached.
    #[error("could not connect to orchestration backend: {reason}")]
    BackendUnavailable {
        /// Underlying transport error.
        reason: String,
    },

    /// Network creation failed.
    #[error("could not create network {name}: {reason}")]
    NetworkCreate {
        /// Requested network name.
        name: String,
        /// Backend error.
        reason: String,
    },

    /// Attaching or detaching a container failed.
    #[error("could not {action} container {instance} on network {network}: {reason}")]
    NetworkMembership {
        /// `attach` or `detach`.
        action: &'static str,
        /// Network name.
        network: String,
        /// Container identifier.
        instance: String,
        /// Backend error.
        reason: String,
    },

    /// Container could not be started.
    #[error("could not start {image}: {reason}")]
    InstanceStart {
        /// Image reference.
        image: String,
        /// Backend error.
        reason: String,
    },

    /// Container has no address in the requested network.
    #[error("container {instance} has no address in network {network}")]
    AddressUnavailable {
        /// Container identifier.
        instance: String,
        /// Network name, or `none` for a detached instance.
        network: String,
    },

    /// Container inspection failed.
    #[error("could not inspect container {instance}: {reason}")]
    Inspect {
        /// Container identifier.
        instance: String,
        /// Backend error.
        reason: String,
    },

    /// Retry budget exhausted before the target accepted a connection.
    #[error("{target} not reachable after {attempts} attempts in {elapsed:?}: {last_error}")]
    ReadinessTimeout {
        /// Dialed address.
        target: String,
        /// Dial attempts made.
        attempts: u32,
        /// Wall time spent.
        elapsed: Duration,
        /// Error from the final attempt.
        last_error: String,
    },

    /// A port expected to be closed accepted a connection.
    #[error("{target} unexpectedly accepted a connection")]
    UnexpectedlyOpen {
        /// Dialed address.
        target: String,
    },

    /// A host port binding exists that should not.
    #[error("unexpected published binding for {port}: host port {host_port}")]
    UnexpectedBinding {
        /// Container port key (`8334/tcp`).
        port: String,
        /// Published host port.
        host_port: u16,
    },

    /// A one-shot probe could not be carried out.
    #[error("probe of {target} failed: {reason}")]
    Probe {
        /// Dialed address.
        target: String,
        /// Transport error.
        reason: String,
    },

    /// TLS handshake against the RPC endpoint failed.
    #[error("TLS handshake with {target} failed: {reason}")]
    Handshake {
        /// Dialed address.
        target: String,
        /// TLS or transport error.
        reason: String,
    },

    /// Peer certificates could not be extracted from the handshake.
    #[error("could not harvest certificates from {target}: {reason}")]
    Harvest {
        /// Dialed address.
        target: String,
        /// What went wrong.
        reason: String,
    },

    /// RPC client could not be built or connected.
    #[error("could not connect RPC client to {target}: {reason}")]
    RpcConnect {
        /// RPC URL.
        target: String,
        /// Client error.
        reason: String,
    },

    /// RPC call failed on an established session.
    #[error("RPC call {method} failed: {reason}")]
    Rpc {
        /// Method name.
        method: String,
        /// Client or server error.
        reason: String,
    },

    /// Releasing a backend resource failed; later runs may collide with it.
    #[error("could not purge {resource}: {reason}")]
    Teardown {
        /// `container <id>` or `network <name>`.
        resource: String,
        /// Backend error.
        reason: String,
    },

    /// Scenario failed and teardown failed too.
    #[error("{primary}; teardown also failed: {teardown}")]
    TeardownAfterFailure {
        /// Failure from the scenario body.
        primary: Box<HarnessError>,
        /// Failure from teardown.
        teardown: Box<HarnessError>,
    },
}

impl HarnessError {
    /// `true` for errors raised while releasing resources.
    pub fn is_teardown(&self) -> bool {
        matches!(
            self,
            Self::Teardown { .. } | Self::TeardownAfterFailure { .. }
        )
    }

    /// Join a primary failure with the result of the teardown that followed it.
    pub fn with_teardown(self, teardown: Result<(), HarnessError>) -> Self {
        match teardown {
            Ok(()) => self,
            Err(teardown) => Self::TeardownAfterFailure {
                primary: Box::new(self),
                teardown: Box::new(teardown),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_timeout_display_names_target_and_cause() {
        let err = HarnessError::ReadinessTimeout {
            target: "172.18.0.2:8333".into(),
            attempts: 7,
            elapsed: Duration::from_secs(3),
            last_error: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("172.18.0.2:8333"));
        assert!(msg.contains("7 attempts"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_with_teardown_keeps_primary_when_cleanup_succeeds() {
        let err = HarnessError::UnexpectedlyOpen {
            target: "x".into(),
        }
        .with_teardown(Ok(()));
        assert!(matches!(err, HarnessError::UnexpectedlyOpen { .. }));
        assert!(!err.is_teardown());
    }

    #[test]
    fn test_with_teardown_reports_both_failures() {
        let err = HarnessError::UnexpectedlyOpen {
            target: "x".into(),
        }
        .with_teardown(Err(HarnessError::Teardown {
            resource: "network n".into(),
            reason: "in use".into(),
        }));
        assert!(err.is_teardown());
        let msg = err.to_string();
        assert!(msg.contains("unexpectedly accepted"));
        assert!(msg.contains("network n"));
    }
}
