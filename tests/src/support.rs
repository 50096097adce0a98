//! Per-scenario setup shared by every Docker test.

use std::sync::Arc;

use nx_harness::{DockerBackend, HarnessConfig, HarnessError, Scenario, Topology, TracingSink};

/// Build a scenario against the local Docker engine.
///
/// Installs the test subscriber, reads [`HarnessConfig::from_env`], and
/// routes relayed container output to `tracing` under the scenario's name.
pub async fn docker_scenario(name: &str, topology: Topology) -> Result<Scenario, HarnessError> {
    nx_telemetry::init_for_tests();

    let config = HarnessConfig::from_env();
    tracing::info!(
        scenario = name,
        image = %config.image.reference(),
        network = %config.network_name(name),
        "preparing scenario"
    );

    let backend = Arc::new(DockerBackend::connect().await?);
    let sink = Arc::new(TracingSink::new(name));
    Ok(Scenario::new(name, topology, config, backend, sink))
}
