//! Dry-run stand-ins: real chain reads, no signing and no broadcast

use super::signer::eip1559_request;
use super::{BuildError, ChainClient, ChainConnector, ChainError, TransactionBuilder};
use crate::endpoint_pool::Endpoint;
use crate::types::{FeeParams, Receipt, SignedSubmission, SubmissionHandle, TxTemplate};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

/// Encodes the unsigned request instead of signing it
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsignedBuilder;

#[async_trait]
impl TransactionBuilder for UnsignedBuilder {
    async fn build(
        &self,
        _endpoint: &Endpoint,
        template: &TxTemplate,
        nonce: u64,
        fees: FeeParams,
    ) -> Result<SignedSubmission, BuildError> {
        let request = eip1559_request(template, nonce, fees);
        let raw = serde_json::to_vec(&request)
            .map_err(|e| BuildError::InvalidTemplate(e.to_string()))?;
        Ok(SignedSubmission { raw, nonce, fees })
    }
}

/// Wraps a live client; dispatch is answered locally with a content hash
#[derive(Debug)]
pub struct SimulatedClient {
    inner: Arc<dyn ChainClient>,
}

impl SimulatedClient {
    pub fn new(inner: Arc<dyn ChainClient>) -> Self {
        Self { inner }
    }

    /// Deterministic handle derived from the submission bytes
    pub fn handle_for(submission: &SignedSubmission) -> SubmissionHandle {
        let digest = Sha256::digest(&submission.raw);
        SubmissionHandle::new(format!("0x{}", hex::encode(digest)))
    }
}

#[async_trait]
impl ChainClient for SimulatedClient {
    fn url(&self) -> &str {
        self.inner.url()
    }

    async fn block_height(&self) -> Result<u64, ChainError> {
        self.inner.block_height().await
    }

    async fn nonce(&self, account: &str) -> Result<u64, ChainError> {
        self.inner.nonce(account).await
    }

    async fn fee_estimate(&self) -> Result<FeeParams, ChainError> {
        self.inner.fee_estimate().await
    }

    async fn dispatch(&self, submission: &SignedSubmission) -> Result<SubmissionHandle, ChainError> {
        let handle = Self::handle_for(submission);
        info!(
            url = %self.url(),
            nonce = submission.nonce,
            handle = %handle,
            "🧪 Simulated dispatch (not broadcast)"
        );
        Ok(handle)
    }

    async fn receipt(&self, _handle: &SubmissionHandle) -> Result<Option<Receipt>, ChainError> {
        Ok(None)
    }
}

/// Wraps every client produced by `inner` in a [`SimulatedClient`]
pub struct SimulatedConnector<C> {
    inner: C,
}

impl<C: ChainConnector> SimulatedConnector<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: ChainConnector> ChainConnector for SimulatedConnector<C> {
    fn connect(&self, url: &str) -> Result<Arc<dyn ChainClient>, ChainError> {
        let inner = self.inner.connect(url)?;
        Ok(Arc::new(SimulatedClient::new(inner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_template, test_endpoint, MockChainClient};

    #[tokio::test]
    async fn dispatch_never_reaches_inner_client() {
        let inner = Arc::new(MockChainClient::new("http://node-a").with_height(77));
        let client = SimulatedClient::new(inner.clone());

        let submission = UnsignedBuilder
            .build(
                &test_endpoint("http://node-a"),
                &sample_template(),
                3,
                FeeParams::default(),
            )
            .await
            .unwrap();
        let handle = client.dispatch(&submission).await.unwrap();

        assert_eq!(handle, SimulatedClient::handle_for(&submission));
        assert_eq!(handle.as_str().len(), 66);
        assert_eq!(inner.dispatch_calls(), 0);
        assert_eq!(client.block_height().await.unwrap(), 77);
    }

    #[tokio::test]
    async fn unsigned_payload_is_the_request_json() {
        let submission = UnsignedBuilder
            .build(
                &test_endpoint("http://node-a"),
                &sample_template(),
                12,
                FeeParams::default(),
            )
            .await
            .unwrap();

        let decoded: serde_json::Value = serde_json::from_slice(&submission.raw).unwrap();
        assert_eq!(decoded["nonce"], "0xc");
        assert_eq!(decoded["type"], "0x2");
    }
}
