use crate::chain::{BuildError, ChainError, TransactionBuilder};
use crate::endpoint_pool::Endpoint;
use crate::errors::{BroadcastError, FailureClass};
use crate::metrics::metrics;
use crate::types::{FeeParams, SubmissionHandle, TxTemplate};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// Lifecycle of one endpoint's attempt within a round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Pending,
    Sent(SubmissionHandle),
    Rejected(BroadcastError),
    TimedOut,
}

impl AttemptOutcome {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Raw failure from the fetch/build/dispatch pipeline, before classification
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Build(#[from] BuildError),
}

impl AttemptError {
    /// Text the retry policy classifies; endpoint context stripped
    pub fn message(&self) -> String {
        match self {
            Self::Chain(err) => err.message(),
            Self::Build(err) => err.message(),
        }
    }

    /// Attach the policy's classification and the endpoint it came from
    pub fn into_broadcast(self, endpoint: &str, class: FailureClass) -> BroadcastError {
        let message = self.to_string();
        if class == FailureClass::PermanentStop {
            return BroadcastError::RemoteRejection {
                endpoint: endpoint.to_string(),
                message,
                class,
            };
        }

        match self {
            Self::Chain(ChainError::Timeout { timeout_ms, .. }) => BroadcastError::Timeout {
                context: endpoint.to_string(),
                timeout_ms,
            },
            Self::Chain(ChainError::Transport { message, .. }) => BroadcastError::EndpointUnavailable {
                endpoint: endpoint.to_string(),
                message,
            },
            Self::Chain(err) => BroadcastError::RemoteRejection {
                endpoint: endpoint.to_string(),
                message: err.message(),
                class,
            },
            Self::Build(_) => BroadcastError::RemoteRejection {
                endpoint: endpoint.to_string(),
                message,
                class,
            },
        }
    }
}

/// One endpoint's attempt: fresh nonce and fees, build, dispatch
#[derive(Debug)]
pub struct SubmissionAttempt {
    pub round: u32,
    pub endpoint: Arc<Endpoint>,
    /// Filled once fetched from this endpoint
    pub nonce: Option<u64>,
    pub fees: Option<FeeParams>,
    outcome: AttemptOutcome,
}

impl SubmissionAttempt {
    pub fn new(round: u32, endpoint: Arc<Endpoint>) -> Self {
        Self {
            round,
            endpoint,
            nonce: None,
            fees: None,
            outcome: AttemptOutcome::Pending,
        }
    }

    pub fn outcome(&self) -> &AttemptOutcome {
        &self.outcome
    }

    /// Settled in a way that says nothing about the endpoint's chain state:
    /// no answer, or a transport failure. Such endpoints get re-probed.
    pub fn unreachable(&self) -> bool {
        matches!(
            self.outcome,
            AttemptOutcome::TimedOut
                | AttemptOutcome::Rejected(BroadcastError::EndpointUnavailable { .. })
                | AttemptOutcome::Rejected(BroadcastError::Timeout { .. })
        )
    }

    /// Move out of `Pending`. Later calls are ignored and return false.
    pub fn settle(&mut self, outcome: AttemptOutcome) -> bool {
        if self.outcome.is_settled() {
            return false;
        }
        self.outcome = outcome;
        true
    }

    /// Fetch parameters from this endpoint, build, and dispatch
    pub async fn execute(
        &mut self,
        template: &TxTemplate,
        builder: &dyn TransactionBuilder,
    ) -> Result<SubmissionHandle, AttemptError> {
        let client = self.endpoint.client();

        let (nonce, estimate) = tokio::try_join!(client.nonce(&template.from), client.fee_estimate())?;
        let fees = estimate.with_overrides(&template.fees);
        self.nonce = Some(nonce);
        self.fees = Some(fees);

        let submission = builder.build(&self.endpoint, template, nonce, fees).await?;

        let started = Instant::now();
        let handle = client.dispatch(&submission).await?;
        metrics().dispatch_latency.observe(started.elapsed().as_secs_f64());

        debug!(
            round = self.round + 1,
            endpoint = %self.endpoint.url(),
            nonce,
            handle = %handle,
            "Dispatch accepted"
        );
        Ok(handle)
    }
}

/// A finished attempt on its way back to the round collector
#[derive(Debug)]
pub(crate) struct AttemptReport {
    /// Position in the round's launch order
    pub slot: usize,
    pub attempt: SubmissionAttempt,
    pub result: Result<SubmissionHandle, AttemptError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_template, test_endpoint_with, MockBuilder, MockChainClient};

    #[test]
    fn settles_only_once() {
        let mut attempt = SubmissionAttempt::new(0, Arc::new(test_endpoint_with(MockChainClient::new("http://a"))));
        assert!(attempt.settle(AttemptOutcome::TimedOut));
        assert!(!attempt.settle(AttemptOutcome::Sent(SubmissionHandle::new("0x1"))));
        assert_eq!(attempt.outcome(), &AttemptOutcome::TimedOut);
    }

    #[tokio::test]
    async fn execute_records_fresh_parameters() {
        let client = MockChainClient::new("http://a").with_nonce_base(41);
        let endpoint = Arc::new(test_endpoint_with(client.clone()));
        let mut template = sample_template();
        template.fees.max_priority_fee_per_gas = Some(7);

        let mut attempt = SubmissionAttempt::new(0, endpoint);
        let handle = attempt.execute(&template, &MockBuilder::default()).await.unwrap();

        assert_eq!(attempt.nonce, Some(41));
        assert_eq!(attempt.fees.unwrap().max_priority_fee_per_gas, 7);
        assert_eq!(handle.as_str(), "http://a#41");
        assert_eq!(client.dispatch_calls(), 1);
    }

    #[test]
    fn classification_shapes_broadcast_error() {
        let transport = AttemptError::Chain(ChainError::Transport {
            endpoint: "http://a".into(),
            message: "connection refused".into(),
        });
        assert!(matches!(
            transport.into_broadcast("http://a", FailureClass::Retryable),
            BroadcastError::EndpointUnavailable { .. }
        ));

        let revert = AttemptError::Chain(ChainError::Rpc {
            endpoint: "http://a".into(),
            code: Some(3),
            message: "execution reverted: NoSupplyLeft".into(),
        });
        let err = revert.into_broadcast("http://a", FailureClass::PermanentStop);
        assert_eq!(err.class(), FailureClass::PermanentStop);
    }

    #[test]
    fn transport_failures_and_silence_mark_endpoint_unreachable() {
        let endpoint = Arc::new(test_endpoint_with(MockChainClient::new("http://a")));

        let mut silent = SubmissionAttempt::new(0, Arc::clone(&endpoint));
        assert!(!silent.unreachable());
        silent.settle(AttemptOutcome::TimedOut);
        assert!(silent.unreachable());

        let mut refused = SubmissionAttempt::new(0, Arc::clone(&endpoint));
        refused.settle(AttemptOutcome::Rejected(BroadcastError::EndpointUnavailable {
            endpoint: "http://a".into(),
            message: "connection refused".into(),
        }));
        assert!(refused.unreachable());

        let mut reverted = SubmissionAttempt::new(0, endpoint);
        reverted.settle(AttemptOutcome::Rejected(BroadcastError::RemoteRejection {
            endpoint: "http://a".into(),
            message: "NotMintable()".into(),
            class: FailureClass::Retryable,
        }));
        assert!(!reverted.unreachable());
    }

    #[test]
    fn classified_text_excludes_endpoint_url() {
        let err = AttemptError::Chain(ChainError::Rpc {
            endpoint: "https://maxsupply-rpc.example".into(),
            code: Some(-32000),
            message: "nonce too low".into(),
        });
        assert_eq!(err.message(), "nonce too low");

        let err = AttemptError::Build(BuildError::Signer("signer offline".into()));
        assert_eq!(err.message(), "signer offline");
    }
}
