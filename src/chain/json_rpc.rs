//! EVM JSON-RPC client over HTTP

use super::encoding::{parse_quantity_u128, parse_quantity_u64};
use super::{ChainClient, ChainConnector, ChainError};
use crate::types::{FeeParams, Receipt, SignedSubmission, SubmissionHandle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Tip used when the node does not implement `eth_maxPriorityFeePerGas`
pub const DEFAULT_PRIORITY_FEE_WEI: u128 = 1_000_000_000;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcErrorObject {
    /// Revert reasons often live in `data`, so keep it in the message the
    /// classifier sees.
    fn into_message(self) -> String {
        match self.data {
            Some(Value::String(data)) if !data.is_empty() => format!("{} ({})", self.message, data),
            Some(Value::Null) | None => self.message,
            Some(other) => format!("{} ({})", self.message, other),
        }
    }
}

fn transport_error(url: &str, err: reqwest::Error, timeout_ms: u64) -> ChainError {
    if err.is_timeout() {
        ChainError::Timeout {
            endpoint: url.to_string(),
            timeout_ms,
        }
    } else {
        ChainError::Transport {
            endpoint: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Single JSON-RPC round trip. A `null` or missing result comes back as
/// `Value::Null`.
pub(crate) async fn call(
    http: &reqwest::Client,
    url: &str,
    id: u64,
    method: &str,
    params: Value,
    timeout_ms: u64,
) -> Result<Value, ChainError> {
    let request = RpcRequest {
        jsonrpc: "2.0",
        id,
        method,
        params,
    };

    trace!(url = %url, method, id, "JSON-RPC request");

    let response = http
        .post(url)
        .json(&request)
        .send()
        .await
        .map_err(|e| transport_error(url, e, timeout_ms))?;
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(url, e, timeout_ms))?;

    let parsed: RpcResponse = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(_) if !status.is_success() => {
            return Err(ChainError::Transport {
                endpoint: url.to_string(),
                message: format!("HTTP {}", status),
            })
        }
        Err(e) => {
            return Err(ChainError::Decode {
                endpoint: url.to_string(),
                message: format!("{}: {}", method, e),
            })
        }
    };

    if let Some(error) = parsed.error {
        return Err(ChainError::Rpc {
            endpoint: url.to_string(),
            code: Some(error.code),
            message: error.into_message(),
        });
    }

    match parsed.result {
        Some(value) => Ok(value),
        None if status.is_success() => Ok(Value::Null),
        None => Err(ChainError::Transport {
            endpoint: url.to_string(),
            message: format!("HTTP {}", status),
        }),
    }
}

/// Client bound to one node URL
#[derive(Debug)]
pub struct JsonRpcClient {
    url: String,
    http: reqwest::Client,
    timeout_ms: u64,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, http: reqwest::Client, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            http,
            timeout_ms: timeout.as_millis() as u64,
            next_id: AtomicU64::new(1),
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        call(&self.http, &self.url, id, method, params, self.timeout_ms).await
    }

    fn decode_error(&self, message: impl Into<String>) -> ChainError {
        ChainError::Decode {
            endpoint: self.url.clone(),
            message: message.into(),
        }
    }

    fn quantity_u64(&self, value: &Value, what: &str) -> Result<u64, ChainError> {
        let raw = value
            .as_str()
            .ok_or_else(|| self.decode_error(format!("{}: expected hex string, got {}", what, value)))?;
        parse_quantity_u64(raw).map_err(|e| self.decode_error(format!("{}: {}", what, e)))
    }

    fn quantity_u128(&self, value: &Value, what: &str) -> Result<u128, ChainError> {
        let raw = value
            .as_str()
            .ok_or_else(|| self.decode_error(format!("{}: expected hex string, got {}", what, value)))?;
        parse_quantity_u128(raw).map_err(|e| self.decode_error(format!("{}: {}", what, e)))
    }
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    fn url(&self) -> &str {
        &self.url
    }

    async fn block_height(&self) -> Result<u64, ChainError> {
        let value = self.request("eth_blockNumber", json!([])).await?;
        self.quantity_u64(&value, "eth_blockNumber")
    }

    async fn nonce(&self, account: &str) -> Result<u64, ChainError> {
        // "latest" so a retry after a dispatched-but-unconfirmed round reuses
        // the same nonce instead of queueing a second transaction.
        let value = self
            .request("eth_getTransactionCount", json!([account, "latest"]))
            .await?;
        self.quantity_u64(&value, "eth_getTransactionCount")
    }

    async fn fee_estimate(&self) -> Result<FeeParams, ChainError> {
        let (block, priority) = tokio::join!(
            self.request("eth_getBlockByNumber", json!(["latest", false])),
            self.request("eth_maxPriorityFeePerGas", json!([])),
        );
        let block = block?;

        let base_fee = match block.get("baseFeePerGas") {
            Some(value) if !value.is_null() => Some(self.quantity_u128(value, "baseFeePerGas")?),
            _ => None,
        };

        let Some(base_fee) = base_fee else {
            // Pre-1559 chain: gas price doubles as both caps
            let value = self.request("eth_gasPrice", json!([])).await?;
            let gas_price = self.quantity_u128(&value, "eth_gasPrice")?;
            return Ok(FeeParams {
                max_fee_per_gas: gas_price,
                max_priority_fee_per_gas: gas_price,
            });
        };

        let priority = match priority {
            Ok(value) => self.quantity_u128(&value, "eth_maxPriorityFeePerGas")?,
            Err(e) if e.is_method_not_found() => {
                debug!(url = %self.url, "eth_maxPriorityFeePerGas unsupported, using default tip");
                DEFAULT_PRIORITY_FEE_WEI
            }
            Err(e) => return Err(e),
        };

        Ok(FeeParams {
            max_fee_per_gas: base_fee.saturating_mul(2).saturating_add(priority),
            max_priority_fee_per_gas: priority,
        })
    }

    async fn dispatch(&self, submission: &SignedSubmission) -> Result<SubmissionHandle, ChainError> {
        let value = self
            .request("eth_sendRawTransaction", json!([submission.raw_hex()]))
            .await?;
        let hash = value
            .as_str()
            .ok_or_else(|| self.decode_error(format!("eth_sendRawTransaction: unexpected result {}", value)))?;
        Ok(SubmissionHandle::new(hash))
    }

    async fn receipt(&self, handle: &SubmissionHandle) -> Result<Option<Receipt>, ChainError> {
        let value = self
            .request("eth_getTransactionReceipt", json!([handle.as_str()]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }

        let block_number = match value.get("blockNumber") {
            Some(number) if !number.is_null() => self.quantity_u64(number, "blockNumber")?,
            _ => return Ok(None),
        };
        let success = match value.get("status") {
            Some(status) if !status.is_null() => self.quantity_u64(status, "status")? == 1,
            // Pre-Byzantium receipts carry no status
            _ => true,
        };

        Ok(Some(Receipt {
            block_number,
            success,
        }))
    }
}

/// Connector sharing one HTTP connection pool across all endpoints
#[derive(Debug, Clone)]
pub struct JsonRpcConnector {
    http: reqwest::Client,
    timeout: Duration,
}

impl JsonRpcConnector {
    pub fn new(timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .tcp_nodelay(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ChainError::Transport {
                endpoint: "<http client>".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { http, timeout })
    }
}

impl ChainConnector for JsonRpcConnector {
    fn connect(&self, url: &str) -> Result<Arc<dyn ChainClient>, ChainError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| ChainError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ChainError::InvalidUrl {
                url: url.to_string(),
                message: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }

        Ok(Arc::new(JsonRpcClient::new(
            url,
            self.http.clone(),
            self.timeout,
        )))
    }
}
