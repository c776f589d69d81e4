//! Transaction building through a remote `eth_signTransaction` signer
//!
//! Keys never enter this process. The signer (clef, a node with an unlocked
//! account, a KMS bridge) receives a fully populated EIP-1559 request and
//! returns the raw signed bytes.

use super::encoding::{decode_data, encode_data, to_quantity};
use super::json_rpc::call;
use super::{BuildError, TransactionBuilder};
use crate::endpoint_pool::Endpoint;
use crate::types::{FeeParams, SignedSubmission, TxTemplate};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// EIP-1559 request object shared by the signer and the dry-run builder
pub(crate) fn eip1559_request(template: &TxTemplate, nonce: u64, fees: FeeParams) -> Value {
    json!({
        "type": "0x2",
        "from": template.from,
        "to": template.to,
        "value": to_quantity(template.value),
        "data": encode_data(&template.data),
        "gas": to_quantity(template.gas_limit as u128),
        "nonce": to_quantity(nonce as u128),
        "chainId": to_quantity(template.chain_id as u128),
        "maxFeePerGas": to_quantity(fees.max_fee_per_gas),
        "maxPriorityFeePerGas": to_quantity(fees.max_priority_fee_per_gas),
    })
}

#[derive(Debug)]
pub struct RemoteSigner {
    url: String,
    http: reqwest::Client,
    timeout_ms: u64,
    next_id: AtomicU64,
}

impl RemoteSigner {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, BuildError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BuildError::Signer(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
            timeout_ms: timeout.as_millis() as u64,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// geth returns `{ raw, tx }`, clef and most bridges a bare hex string
    fn extract_raw(result: &Value) -> Result<Vec<u8>, BuildError> {
        let raw = match result {
            Value::String(raw) => raw.as_str(),
            Value::Object(map) => map
                .get("raw")
                .and_then(Value::as_str)
                .ok_or_else(|| BuildError::Signer("signer response missing `raw`".to_string()))?,
            other => {
                return Err(BuildError::Signer(format!(
                    "unexpected signer response: {}",
                    other
                )))
            }
        };

        let bytes = decode_data(raw).map_err(BuildError::Signer)?;
        if bytes.is_empty() {
            return Err(BuildError::Signer("signer returned empty transaction".to_string()));
        }
        Ok(bytes)
    }
}

#[async_trait]
impl TransactionBuilder for RemoteSigner {
    async fn build(
        &self,
        endpoint: &Endpoint,
        template: &TxTemplate,
        nonce: u64,
        fees: FeeParams,
    ) -> Result<SignedSubmission, BuildError> {
        let request = eip1559_request(template, nonce, fees);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let result = call(
            &self.http,
            &self.url,
            id,
            "eth_signTransaction",
            json!([request]),
            self.timeout_ms,
        )
        .await?;
        let raw = Self::extract_raw(&result)?;

        debug!(
            endpoint = %endpoint.url(),
            nonce,
            bytes = raw.len(),
            "Transaction signed"
        );

        Ok(SignedSubmission { raw, nonce, fees })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_template, test_endpoint};
    use mockito::Matcher;

    #[test]
    fn request_encodes_quantities() {
        let template = sample_template();
        let fees = FeeParams {
            max_fee_per_gas: 30_000_000_000,
            max_priority_fee_per_gas: 1_500_000_000,
        };
        let request = eip1559_request(&template, 9, fees);

        assert_eq!(request["nonce"], "0x9");
        assert_eq!(request["maxFeePerGas"], "0x6fc23ac00");
        assert_eq!(request["maxPriorityFeePerGas"], "0x59682f00");
        assert_eq!(request["chainId"], to_quantity(template.chain_id as u128));
        assert_eq!(request["data"], encode_data(&template.data));
    }

    #[tokio::test]
    async fn build_accepts_geth_style_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "eth_signTransaction" })))
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{"raw":"0x02f86c","tx":{}}}"#)
            .create_async()
            .await;

        let signer = RemoteSigner::new(server.url(), Duration::from_secs(2)).unwrap();
        let submission = signer
            .build(
                &test_endpoint("http://node-a"),
                &sample_template(),
                4,
                FeeParams::default(),
            )
            .await
            .unwrap();

        assert_eq!(submission.raw, vec![0x02, 0xf8, 0x6c]);
        assert_eq!(submission.nonce, 4);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn signer_error_object_is_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"authentication needed: password or unlock"}}"#)
            .create_async()
            .await;

        let signer = RemoteSigner::new(server.url(), Duration::from_secs(2)).unwrap();
        let err = signer
            .build(
                &test_endpoint("http://node-a"),
                &sample_template(),
                0,
                FeeParams::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            BuildError::Rejected {
                code: Some(-32000),
                message: "authentication needed: password or unlock".to_string(),
            }
        );
    }
}
