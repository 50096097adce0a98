//! # NX Telemetry
//!
//! Log output for the node exposure harness.
//!
//! Everything the harness reports (retry diagnostics, lifecycle transitions,
//! relayed container output) goes through `tracing`. This crate installs the
//! subscriber that turns those events into lines.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nx_telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! Test binaries call [`init_for_tests`] at the top of every test; only the
//! first call installs the subscriber.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NX_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `NX_JSON_LOGS` | `false` | Emit JSON lines |

mod config;

pub use config::TelemetryConfig;

use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Install the global `tracing` subscriber described by `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] if the log level is not a valid
/// `EnvFilter` directive, or [`TelemetryError::SubscriberInit`] if a global
/// subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::InvalidFilter {
            directive: config.log_level.clone(),
            reason: e.to_string(),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match (config.json_logs, config.test_writer) {
        (true, true) => builder.json().with_test_writer().try_init(),
        (true, false) => builder.json().try_init(),
        (false, true) => builder.with_test_writer().try_init(),
        (false, false) => builder.try_init(),
    };
    installed.map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    tracing::debug!(
        log_level = %config.log_level,
        json_logs = config.json_logs,
        "telemetry initialized"
    );

    Ok(())
}

/// Install the test subscriber once per test binary.
///
/// Safe to call from every test; later calls return without touching the
/// already-installed subscriber.
pub fn init_for_tests() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        if let Err(e) = init_telemetry(TelemetryConfig::for_tests()) {
            eprintln!("nx-telemetry: {e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = TelemetryConfig {
            log_level: "nx_harness=notalevel".to_string(),
            ..TelemetryConfig::default()
        };
        let err = init_telemetry(config).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidFilter { .. }));
    }

    #[test]
    fn test_init_for_tests_is_repeatable() {
        init_for_tests();
        init_for_tests();
        tracing::info!("still logging after repeated init");
    }
}
