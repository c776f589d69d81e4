//! Chain capabilities the broadcaster relies on
//!
//! The pool, waiter and racer only ever talk to a chain through these
//! traits. `json_rpc` is the EVM HTTP implementation, `signer` builds signed
//! bytes through a remote signer, and `simulation` swaps dispatch and signing
//! for local stand-ins.

pub mod encoding;
pub mod errors;
pub mod json_rpc;
pub mod signer;
pub mod simulation;

pub use errors::{BuildError, ChainError};
pub use json_rpc::{JsonRpcClient, JsonRpcConnector};
pub use signer::RemoteSigner;
pub use simulation::{SimulatedClient, SimulatedConnector, UnsignedBuilder};

use crate::endpoint_pool::Endpoint;
use crate::types::{FeeParams, Receipt, SignedSubmission, SubmissionHandle, TxTemplate};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Read and submit operations against one chain endpoint
#[async_trait]
pub trait ChainClient: Send + Sync + fmt::Debug {
    fn url(&self) -> &str;

    /// Current block height; also used as the liveness probe
    async fn block_height(&self) -> Result<u64, ChainError>;

    /// Next nonce for `account`
    async fn nonce(&self, account: &str) -> Result<u64, ChainError>;

    async fn fee_estimate(&self) -> Result<FeeParams, ChainError>;

    async fn dispatch(&self, submission: &SignedSubmission) -> Result<SubmissionHandle, ChainError>;

    /// `None` while the submission is not yet included
    async fn receipt(&self, handle: &SubmissionHandle) -> Result<Option<Receipt>, ChainError>;
}

/// Creates clients for configured URLs
pub trait ChainConnector: Send + Sync {
    fn connect(&self, url: &str) -> Result<Arc<dyn ChainClient>, ChainError>;
}

/// Produces submission bytes for one endpoint with freshly fetched parameters
#[async_trait]
pub trait TransactionBuilder: Send + Sync + fmt::Debug {
    async fn build(
        &self,
        endpoint: &Endpoint,
        template: &TxTemplate,
        nonce: u64,
        fees: FeeParams,
    ) -> Result<SignedSubmission, BuildError>;
}
