//! Post-dispatch inclusion watching
//!
//! Observes only. The campaign result is already decided when this runs.

use crate::cancel::CancelToken;
use crate::chain::ChainClient;
use crate::types::{Receipt, SubmissionHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ConfirmationWatcher {
    poll_interval: Duration,
    deadline: Duration,
}

impl ConfirmationWatcher {
    pub fn new(poll_interval: Duration, deadline: Duration) -> Self {
        Self {
            poll_interval,
            deadline,
        }
    }

    /// Poll for a receipt until one appears, the deadline passes, or the
    /// token is cancelled.
    pub async fn watch(
        &self,
        client: Arc<dyn ChainClient>,
        handle: &SubmissionHandle,
        cancel: &CancelToken,
    ) -> Option<Receipt> {
        let polling = async {
            loop {
                match client.receipt(handle).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => debug!(handle = %handle, "Receipt not yet available"),
                    Err(e) => debug!(handle = %handle, error = %e, "Receipt query failed"),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(self.deadline, polling) => result.ok(),
        };

        match outcome {
            Some(receipt) if receipt.success => {
                info!(handle = %handle, block = receipt.block_number, "⛓️ Submission included");
            }
            Some(receipt) => {
                warn!(handle = %handle, block = receipt.block_number, "Submission included but reverted");
            }
            None => {
                warn!(
                    handle = %handle,
                    deadline_secs = self.deadline.as_secs(),
                    "No receipt observed before watcher stopped"
                );
            }
        }
        outcome
    }
}
