//! # Ports Layer
//!
//! Trait boundaries between the harness services and the outside world.
//! Only driven (outbound) ports exist: the harness is driven directly by the
//! test functions that call it.

pub mod outbound;

pub use outbound::{BackendError, LogChunk, LogSink, LogSource, OrchestrationBackend};
