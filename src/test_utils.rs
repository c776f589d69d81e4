//! Test Utilities Module
//!
//! Scripted chain clients, a connector over them, and a builder that never
//! signs anything, for deterministic tests of the pool, waiter and racer.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use crate::chain::{BuildError, ChainClient, ChainConnector, ChainError, TransactionBuilder};
use crate::endpoint_pool::Endpoint;
use crate::types::{FeeOverrides, FeeParams, Receipt, SignedSubmission, SubmissionHandle, TxTemplate};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// What a mock endpoint does with a dispatched submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchBehavior {
    Accept,
    /// Answer with a JSON-RPC error carrying this message
    Reject(String),
    /// Never answer
    Hang,
}

/// Height reported by a mock endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightScript {
    Fixed(u64),
    /// `start` at creation, +1 every `block_time` of (virtual) time
    Climbing { start: u64, block_time: Duration },
}

#[derive(Debug, Default)]
struct CallCounters {
    height: AtomicUsize,
    nonce: AtomicUsize,
    fee: AtomicUsize,
    dispatch: AtomicUsize,
    receipt: AtomicUsize,
}

/// Scripted [`ChainClient`]. Clones share counters and switches.
#[derive(Debug, Clone)]
pub struct MockChainClient {
    url: String,
    height: HeightScript,
    origin: Instant,
    latency: Duration,
    dispatch_delay: Duration,
    nonce_base: u64,
    receipt_after: Option<(usize, bool)>,
    dispatch: Arc<Mutex<DispatchBehavior>>,
    probes_failing: Arc<AtomicBool>,
    calls: Arc<CallCounters>,
    heights_seen: Arc<Mutex<Vec<u64>>>,
    submissions: Arc<Mutex<Vec<SignedSubmission>>>,
}

impl MockChainClient {
    /// Live endpoint at height 100 that accepts every dispatch
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            height: HeightScript::Fixed(100),
            origin: Instant::now(),
            latency: Duration::ZERO,
            dispatch_delay: Duration::ZERO,
            nonce_base: 0,
            receipt_after: None,
            dispatch: Arc::new(Mutex::new(DispatchBehavior::Accept)),
            probes_failing: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(CallCounters::default()),
            heights_seen: Arc::new(Mutex::new(Vec::new())),
            submissions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_height(mut self, height: u64) -> Self {
        self.height = HeightScript::Fixed(height);
        self
    }

    pub fn climbing(mut self, start: u64, block_time: Duration) -> Self {
        self.origin = Instant::now();
        self.height = HeightScript::Climbing { start, block_time };
        self
    }

    /// Delay applied to every block-height query
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_dispatch_delay(mut self, delay: Duration) -> Self {
        self.dispatch_delay = delay;
        self
    }

    pub fn with_dispatch(self, behavior: DispatchBehavior) -> Self {
        *self.dispatch.lock() = behavior;
        self
    }

    pub fn with_nonce_base(mut self, nonce: u64) -> Self {
        self.nonce_base = nonce;
        self
    }

    /// Receipt appears on the `n`th receipt query
    pub fn with_receipt_after(mut self, n: usize, success: bool) -> Self {
        self.receipt_after = Some((n, success));
        self
    }

    /// Block-height queries fail until switched back
    pub fn failing_probes(self) -> Self {
        self.probes_failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_probes_failing(&self, failing: bool) {
        self.probes_failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_dispatch(&self, behavior: DispatchBehavior) {
        *self.dispatch.lock() = behavior;
    }

    pub fn url_string(&self) -> String {
        self.url.clone()
    }

    pub fn height_calls(&self) -> usize {
        self.calls.height.load(Ordering::SeqCst)
    }

    pub fn nonce_calls(&self) -> usize {
        self.calls.nonce.load(Ordering::SeqCst)
    }

    pub fn fee_calls(&self) -> usize {
        self.calls.fee.load(Ordering::SeqCst)
    }

    pub fn dispatch_calls(&self) -> usize {
        self.calls.dispatch.load(Ordering::SeqCst)
    }

    pub fn receipt_calls(&self) -> usize {
        self.calls.receipt.load(Ordering::SeqCst)
    }

    /// Every height returned by a successful query, in order
    pub fn heights_seen(&self) -> Vec<u64> {
        self.heights_seen.lock().clone()
    }

    pub fn submissions(&self) -> Vec<SignedSubmission> {
        self.submissions.lock().clone()
    }

    fn current_height(&self) -> u64 {
        match self.height {
            HeightScript::Fixed(height) => height,
            HeightScript::Climbing { start, block_time } => {
                let elapsed = self.origin.elapsed().as_millis();
                let per_block = block_time.as_millis().max(1);
                start + (elapsed / per_block) as u64
            }
        }
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn url(&self) -> &str {
        &self.url
    }

    async fn block_height(&self) -> Result<u64, ChainError> {
        self.calls.height.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.probes_failing.load(Ordering::SeqCst) {
            return Err(ChainError::Transport {
                endpoint: self.url.clone(),
                message: "connection refused".to_string(),
            });
        }
        let height = self.current_height();
        self.heights_seen.lock().push(height);
        Ok(height)
    }

    async fn nonce(&self, _account: &str) -> Result<u64, ChainError> {
        let n = self.calls.nonce.fetch_add(1, Ordering::SeqCst) as u64;
        Ok(self.nonce_base + n)
    }

    async fn fee_estimate(&self) -> Result<FeeParams, ChainError> {
        self.calls.fee.fetch_add(1, Ordering::SeqCst);
        Ok(FeeParams {
            max_fee_per_gas: 30_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        })
    }

    async fn dispatch(&self, submission: &SignedSubmission) -> Result<SubmissionHandle, ChainError> {
        self.calls.dispatch.fetch_add(1, Ordering::SeqCst);
        self.submissions.lock().push(submission.clone());
        if !self.dispatch_delay.is_zero() {
            tokio::time::sleep(self.dispatch_delay).await;
        }

        let behavior = self.dispatch.lock().clone();
        match behavior {
            DispatchBehavior::Accept => Ok(SubmissionHandle::new(format!("{}#{}", self.url, submission.nonce))),
            DispatchBehavior::Reject(message) => Err(ChainError::Rpc {
                endpoint: self.url.clone(),
                code: Some(-32000),
                message,
            }),
            DispatchBehavior::Hang => std::future::pending().await,
        }
    }

    async fn receipt(&self, _handle: &SubmissionHandle) -> Result<Option<Receipt>, ChainError> {
        let n = self.calls.receipt.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(match self.receipt_after {
            Some((after, success)) if n >= after => Some(Receipt {
                block_number: self.current_height(),
                success,
            }),
            _ => None,
        })
    }
}

/// Connector handing out pre-built mock clients by URL
pub struct MockConnector {
    clients: HashMap<String, MockChainClient>,
}

impl MockConnector {
    pub fn new(clients: Vec<MockChainClient>) -> Self {
        Self {
            clients: clients.into_iter().map(|c| (c.url_string(), c)).collect(),
        }
    }
}

impl ChainConnector for MockConnector {
    fn connect(&self, url: &str) -> Result<Arc<dyn ChainClient>, ChainError> {
        match self.clients.get(url) {
            Some(client) => Ok(Arc::new(client.clone())),
            None => Err(ChainError::InvalidUrl {
                url: url.to_string(),
                message: "no mock registered".to_string(),
            }),
        }
    }
}

/// Builder that encodes the nonce as the payload
#[derive(Debug, Clone, Default)]
pub struct MockBuilder {
    fail_with: Option<String>,
    builds: Arc<AtomicUsize>,
}

impl MockBuilder {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            builds: Arc::default(),
        }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionBuilder for MockBuilder {
    async fn build(
        &self,
        _endpoint: &Endpoint,
        _template: &TxTemplate,
        nonce: u64,
        fees: FeeParams,
    ) -> Result<SignedSubmission, BuildError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_with {
            return Err(BuildError::Signer(message.clone()));
        }
        Ok(SignedSubmission {
            raw: nonce.to_be_bytes().to_vec(),
            nonce,
            fees,
        })
    }
}

/// Mint call against a fixed contract
pub fn sample_template() -> TxTemplate {
    TxTemplate {
        from: "0x00000000000000000000000000000000000000aa".to_string(),
        to: "0x00000000000000000000000000000000000000bb".to_string(),
        value: 0,
        data: vec![0xa0, 0x71, 0x2d, 0x68],
        gas_limit: 200_000,
        chain_id: 33139,
        fees: FeeOverrides::default(),
    }
}

pub fn test_endpoint(url: &str) -> Endpoint {
    test_endpoint_with(MockChainClient::new(url))
}

pub fn test_endpoint_with(client: MockChainClient) -> Endpoint {
    Endpoint::new(0, client.url_string(), Arc::new(client))
}
