//! Docker scenarios, grouped by what they check.

pub mod ports;
pub mod rpc;
