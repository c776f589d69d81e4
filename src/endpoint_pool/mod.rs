//! Endpoint pool
//!
//! Probe-based liveness and latency ranking over the configured endpoints,
//! with round-robin re-probing when nothing answers.

pub mod endpoint;
pub mod pool;
pub mod pool_config;

pub use endpoint::{Endpoint, Liveness, ProbeSnapshot, ProbeStats};
pub use pool::EndpointPool;
pub use pool_config::{CandidateSet, EndpointConfig, PoolSettings};
