//! # RPC Scenarios
//!
//! The RPC listener must speak only TLS and accept an authenticated session
//! pinned to the certificate the instance presents.

#[cfg(test)]
mod tests {
    use nx_harness::{DaemonPort, HarnessError, SecureBootstrap, Topology};

    use crate::support::docker_scenario;

    #[tokio::test]
    #[ignore = "requires a Docker engine and the daemon image"]
    async fn test_rpc_uses_tls() {
        let scenario = docker_scenario("rpc_uses_tls", Topology::IsolatedWithRpc)
            .await
            .unwrap();

        scenario
            .run(|ctx| async move {
                ctx.await_port(DaemonPort::Rpc).await?;
                assert!(
                    ctx.plaintext_rejected(DaemonPort::Rpc).await?,
                    "RPC port answered a plaintext request"
                );
                ctx.await_tls(DaemonPort::Rpc).await?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a Docker engine and the daemon image"]
    async fn test_rpc_connection() {
        let scenario = docker_scenario("rpc_connection", Topology::IsolatedWithRpc)
            .await
            .unwrap();

        scenario
            .run(|ctx| async move {
                let addr = ctx.address(DaemonPort::Rpc).await?;
                ctx.poller().await_tcp(addr).await?;

                let bundle = SecureBootstrap::harvest(addr).await?;
                assert!(!bundle.is_empty());

                let client = ctx.rpc_client().await?;
                client.shutdown().await.map_err(|e| HarnessError::Rpc {
                    method: "shutdown".to_string(),
                    reason: e.to_string(),
                })
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a Docker engine and the daemon image"]
    async fn test_rpc_get_block_count() {
        let scenario = docker_scenario("rpc_get_block_count", Topology::IsolatedWithRpc)
            .await
            .unwrap();

        scenario
            .run(|ctx| async move {
                let client = ctx.rpc_client().await?;
                let rpc_err = |method: &str, e: nx_harness::RpcError| HarnessError::Rpc {
                    method: method.to_string(),
                    reason: e.to_string(),
                };

                let height = client
                    .get_block_count()
                    .await
                    .map_err(|e| rpc_err("getblockcount", e))?;
                assert!(height >= 0, "negative block count {height}");

                client.shutdown().await.map_err(|e| rpc_err("shutdown", e))
            })
            .await
            .unwrap();
    }
}
