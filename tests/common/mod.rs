//! Shared fixtures for the integration tests.
//!
//! The crate's own mocks live behind `cfg(test)`, which integration tests
//! cannot see, so this module carries a smaller scripted client.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strike::chain::{BuildError, ChainError};
use strike::endpoint_pool::{Endpoint, EndpointConfig, PoolSettings};
use strike::types::{FeeOverrides, FeeParams, Receipt, SignedSubmission, SubmissionHandle, TxTemplate};
use strike::{ChainClient, ChainConnector, EndpointPool, EventBus, TransactionBuilder};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Accept { after: Duration },
    Reject(String),
    /// Connection refused at dispatch time
    Unreachable,
    Hang,
}

#[derive(Debug)]
struct State {
    url: String,
    origin: Instant,
    start_height: u64,
    block_time: Option<Duration>,
    probe_latency: Duration,
    failing: AtomicBool,
    dispatch: Mutex<Dispatch>,
    next_nonce: AtomicU64,
    height_calls: AtomicUsize,
    dispatches: Mutex<Vec<SignedSubmission>>,
    heights: Mutex<Vec<u64>>,
}

/// Scripted endpoint; clones share state
#[derive(Debug, Clone)]
pub struct ScriptedClient {
    state: Arc<State>,
}

impl ScriptedClient {
    pub fn new(url: &str) -> Self {
        Self::build(url, 100, None, Duration::ZERO)
    }

    /// Height starts at `start` and grows by one every `block_time`
    pub fn climbing(url: &str, start: u64, block_time: Duration) -> Self {
        Self::build(url, start, Some(block_time), Duration::ZERO)
    }

    pub fn with_probe_latency(url: &str, latency: Duration) -> Self {
        Self::build(url, 100, None, latency)
    }

    fn build(url: &str, start_height: u64, block_time: Option<Duration>, probe_latency: Duration) -> Self {
        Self {
            state: Arc::new(State {
                url: url.to_string(),
                origin: Instant::now(),
                start_height,
                block_time,
                probe_latency,
                failing: AtomicBool::new(false),
                dispatch: Mutex::new(Dispatch::Accept { after: Duration::ZERO }),
                next_nonce: AtomicU64::new(7),
                height_calls: AtomicUsize::new(0),
                dispatches: Mutex::new(Vec::new()),
                heights: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn dispatching(self, dispatch: Dispatch) -> Self {
        self.set_dispatch(dispatch);
        self
    }

    pub fn set_dispatch(&self, dispatch: Dispatch) {
        *self.state.dispatch.lock().unwrap() = dispatch;
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    pub fn url(&self) -> &str {
        &self.state.url
    }

    pub fn dispatches(&self) -> Vec<SignedSubmission> {
        self.state.dispatches.lock().unwrap().clone()
    }

    pub fn height_calls(&self) -> usize {
        self.state.height_calls.load(Ordering::SeqCst)
    }

    /// Heights returned by successful queries, in order
    pub fn heights(&self) -> Vec<u64> {
        self.state.heights.lock().unwrap().clone()
    }

    fn height_now(&self) -> u64 {
        match self.state.block_time {
            Some(block_time) => {
                let blocks = self.state.origin.elapsed().as_nanos() / block_time.as_nanos().max(1);
                self.state.start_height + blocks as u64
            }
            None => self.state.start_height,
        }
    }
}

#[async_trait]
impl ChainClient for ScriptedClient {
    fn url(&self) -> &str {
        &self.state.url
    }

    async fn block_height(&self) -> Result<u64, ChainError> {
        self.state.height_calls.fetch_add(1, Ordering::SeqCst);
        if !self.state.probe_latency.is_zero() {
            tokio::time::sleep(self.state.probe_latency).await;
        }
        if self.state.failing.load(Ordering::SeqCst) {
            return Err(ChainError::Transport {
                endpoint: self.state.url.clone(),
                message: "connection reset".to_string(),
            });
        }
        let height = self.height_now();
        self.state.heights.lock().unwrap().push(height);
        Ok(height)
    }

    /// Every call returns the next nonce, as if each round saw a new chain state
    async fn nonce(&self, _account: &str) -> Result<u64, ChainError> {
        Ok(self.state.next_nonce.fetch_add(1, Ordering::SeqCst))
    }

    async fn fee_estimate(&self) -> Result<FeeParams, ChainError> {
        Ok(FeeParams {
            max_fee_per_gas: 20_000_000_000,
            max_priority_fee_per_gas: 1_500_000_000,
        })
    }

    async fn dispatch(&self, submission: &SignedSubmission) -> Result<SubmissionHandle, ChainError> {
        self.state.dispatches.lock().unwrap().push(submission.clone());
        let dispatch = self.state.dispatch.lock().unwrap().clone();
        match dispatch {
            Dispatch::Accept { after } => {
                tokio::time::sleep(after).await;
                Ok(SubmissionHandle::new(format!("{}/{}", self.state.url, submission.nonce)))
            }
            Dispatch::Reject(message) => Err(ChainError::Rpc {
                endpoint: self.state.url.clone(),
                code: Some(-32000),
                message,
            }),
            Dispatch::Unreachable => Err(ChainError::Transport {
                endpoint: self.state.url.clone(),
                message: "connection refused".to_string(),
            }),
            Dispatch::Hang => std::future::pending().await,
        }
    }

    async fn receipt(&self, _handle: &SubmissionHandle) -> Result<Option<Receipt>, ChainError> {
        Ok(None)
    }
}

pub struct ScriptedConnector {
    clients: HashMap<String, ScriptedClient>,
}

impl ChainConnector for ScriptedConnector {
    fn connect(&self, url: &str) -> Result<Arc<dyn ChainClient>, ChainError> {
        self.clients
            .get(url)
            .map(|c| Arc::new(c.clone()) as Arc<dyn ChainClient>)
            .ok_or_else(|| ChainError::InvalidUrl {
                url: url.to_string(),
                message: "unknown endpoint".to_string(),
            })
    }
}

/// Builder whose payload is the nonce
#[derive(Debug, Default)]
pub struct NonceBuilder;

#[async_trait]
impl TransactionBuilder for NonceBuilder {
    async fn build(
        &self,
        _endpoint: &Endpoint,
        _template: &TxTemplate,
        nonce: u64,
        fees: FeeParams,
    ) -> Result<SignedSubmission, BuildError> {
        Ok(SignedSubmission {
            raw: nonce.to_be_bytes().to_vec(),
            nonce,
            fees,
        })
    }
}

pub fn connector(clients: &[ScriptedClient]) -> ScriptedConnector {
    ScriptedConnector {
        clients: clients.iter().map(|c| (c.url().to_string(), c.clone())).collect(),
    }
}

pub async fn pool_of(clients: &[ScriptedClient]) -> EndpointPool {
    pool_with(clients, PoolSettings::default()).await
}

pub async fn pool_with(clients: &[ScriptedClient], settings: PoolSettings) -> EndpointPool {
    let configs = clients
        .iter()
        .map(|c| EndpointConfig::from(c.url()))
        .collect();
    EndpointPool::initialize(configs, &connector(clients), settings, EventBus::default())
        .await
        .expect("pool")
}

pub fn template() -> TxTemplate {
    TxTemplate {
        from: "0x1111111111111111111111111111111111111111".to_string(),
        to: "0x2222222222222222222222222222222222222222".to_string(),
        value: 10_000_000_000_000_000,
        data: vec![0x1e, 0x83, 0x40, 0x9a],
        gas_limit: 250_000,
        chain_id: 1,
        fees: FeeOverrides::default(),
    }
}
