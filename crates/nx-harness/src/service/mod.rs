//! # Service Layer
//!
//! Harness orchestration on top of the [`OrchestrationBackend`] port:
//!
//! - [`IsolationBoundary`]: ephemeral internal network
//! - [`DaemonInstance`]: container lifecycle
//! - [`ReadinessPoller`]: bounded retry of a dial closure
//! - [`SecureBootstrap`]: certificate harvest and pinned RPC client
//! - [`LogRelay`]: container output into the reporting sink
//! - [`Scenario`]: wires the above together with guaranteed teardown
//!
//! [`OrchestrationBackend`]: crate::ports::OrchestrationBackend

pub mod boundary;
pub mod bootstrap;
pub mod instance;
pub mod poller;
pub mod probe;
pub mod relay;
pub mod scenario;

pub use boundary::IsolationBoundary;
pub use bootstrap::SecureBootstrap;
pub use instance::DaemonInstance;
pub use poller::{ReadinessPoller, Ready};
pub use relay::{render, strip_line_endings, LogRelay, RelayHandle, STDERR_PREFIX, STDOUT_PREFIX};
pub use scenario::{Scenario, ScenarioContext, Topology};
