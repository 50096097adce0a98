//! # Adapters Layer
//!
//! Concrete implementations of the outbound ports.
//!
//! - `docker`: Docker Engine backend (feature `docker`)
//! - `sink`: tracing and in-memory reporting sinks

#[cfg(feature = "docker")]
pub mod docker;
pub mod sink;

#[cfg(feature = "docker")]
pub use docker::DockerBackend;
pub use sink::{MemorySink, TracingSink};
