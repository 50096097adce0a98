//! # Listening Port Scenarios
//!
//! Which ports the daemon opens under each startup configuration:
//!
//! 1. **Default flags, isolated network**: P2P open, RPC closed
//! 2. **RPC flags, isolated network**: RPC open
//! 3. **Default flags, no network**: no host binding for the RPC port

#[cfg(test)]
mod tests {
    use nx_harness::{DaemonPort, Topology};

    use crate::support::docker_scenario;

    #[tokio::test]
    #[ignore = "requires a Docker engine and the daemon image"]
    async fn test_default_listening_ports() {
        let scenario = docker_scenario("default_listening_ports", Topology::Isolated)
            .await
            .unwrap();

        scenario
            .run(|ctx| async move {
                ctx.await_port(DaemonPort::PeerToPeer).await?;
                ctx.assert_port_closed(DaemonPort::Rpc).await
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a Docker engine and the daemon image"]
    async fn test_rpc_listening_port() {
        let scenario = docker_scenario("rpc_listening_port", Topology::IsolatedWithRpc)
            .await
            .unwrap();

        scenario
            .run(|ctx| async move {
                let ready = ctx.await_port(DaemonPort::Rpc).await?;
                tracing::info!(
                    attempts = ready.attempts,
                    elapsed = ?ready.elapsed,
                    "RPC port open"
                );
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a Docker engine and the daemon image"]
    async fn test_rpc_not_listening_by_default() {
        let scenario = docker_scenario("rpc_not_listening_by_default", Topology::Detached)
            .await
            .unwrap();

        scenario
            .run(|ctx| async move { ctx.assert_not_published(DaemonPort::Rpc).await })
            .await
            .unwrap();
    }
}
