//! # Node Exposure Scenarios
//!
//! One daemon container and one isolated network per test.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── support.rs        # Docker backend, telemetry and config per scenario
//! └── scenarios/
//!     ├── ports.rs      # Which ports a startup configuration opens
//!     └── rpc.rs        # TLS-only RPC listener and authenticated sessions
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # Needs a Docker engine and the daemon image (default btcd-dockertests:latest)
//! cargo test -p nx-tests -- --ignored
//!
//! # Different image, more verbose output
//! NX_DAEMON_IMAGE=btcd NX_DAEMON_TAG=v0.24 NX_LOG_LEVEL=debug \
//!     cargo test -p nx-tests -- --ignored --nocapture
//! ```

pub mod scenarios;
pub mod support;
