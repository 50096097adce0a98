//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for the harness log output.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log level filter directive (trace, debug, info, warn, error, or a full
    /// `EnvFilter` directive such as `nx_harness=debug`)
    pub log_level: String,

    /// Whether to emit JSON formatted lines
    pub json_logs: bool,

    /// Whether output goes through libtest's capture instead of raw stdout
    pub test_writer: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            test_writer: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `NX_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `NX_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("NX_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("NX_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),

            test_writer: false,
        }
    }

    /// Configuration used by test binaries: environment settings, routed
    /// through libtest's per-test output capture.
    pub fn for_tests() -> Self {
        Self {
            test_writer: true,
            ..Self::from_env()
        }
    }
}
