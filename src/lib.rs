//! strike - precision-timed multi-endpoint transaction broadcaster
//!
//! Waits for an activation condition (a wall-clock instant or a block
//! height), then races one transaction across every live chain endpoint,
//! retrying in rounds until a dispatch is accepted, a rejection proves
//! further attempts futile, or the attempt budget runs out.

pub mod activation;
pub mod cancel;
pub mod chain;
pub mod clock;
pub mod config;
pub mod confirmation;
pub mod endpoint_pool;
pub mod endpoints;
pub mod errors;
pub mod metrics;
pub mod racer;
pub mod reporter;
pub mod types;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use activation::{Activation, ActivationWaiter, WaiterSettings};
pub use cancel::CancelToken;
pub use chain::{ChainClient, ChainConnector, TransactionBuilder};
pub use clock::{Clock, MonotonicClock};
pub use config::{Config, ConfigError};
pub use endpoint_pool::{CandidateSet, Endpoint, EndpointConfig, EndpointPool, Liveness, PoolSettings};
pub use errors::{BroadcastError, FailureClass};
pub use racer::{RetryPolicy, SubmissionRacer};
pub use reporter::{EventBus, ProgressEvent};
pub use types::{ActivationCondition, ExhaustReason, Mode, RunResult, SubmissionHandle, TxTemplate};
