//! Block explorer client for Etherscan-compatible APIs

use crate::config::ChainConfig;
use crate::error::{TracerError, TracerResult};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Read-only access to receipts and logs through a chain's explorer API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExplorerClient: Send + Sync {
    /// Raw receipt object, `None` when the explorer does not know the hash
    async fn fetch_transaction_receipt(
        &self,
        chain: &ChainConfig,
        tx_hash: &str,
    ) -> TracerResult<Option<Value>>;

    /// All logs emitted by the transaction
    async fn fetch_transaction_logs(
        &self,
        chain: &ChainConfig,
        tx_hash: &str,
    ) -> TracerResult<Vec<Value>>;
}

/// Etherscan response envelope. `error` is set by the proxy module,
/// `status`/`message` by the native modules.
#[derive(Debug, Deserialize)]
struct ExplorerEnvelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ExplorerEnvelope {
    fn into_result(self, chain_id: u64) -> TracerResult<Value> {
        if let Some(error) = self.error {
            return Err(TracerError::Explorer {
                chain_id,
                message: error_message(&error),
            });
        }
        Ok(self.result)
    }
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

/// HTTP client for Etherscan-family explorers
pub struct EtherscanClient {
    client: reqwest::Client,
}

impl EtherscanClient {
    /// Create a client with a per-request timeout
    pub fn new(request_timeout: Duration) -> TracerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TracerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn call(
        &self,
        chain: &ChainConfig,
        module: &str,
        action: &str,
        tx_hash: &str,
    ) -> TracerResult<ExplorerEnvelope> {
        let operation = format!("{}.{} on chain {}", module, action, chain.chain_id);
        debug!(chain_id = chain.chain_id, module, action, tx_hash, "Explorer request");

        let response = self
            .client
            .get(&chain.explorer_api_url)
            .query(&explorer_query(chain, module, action, tx_hash))
            .send()
            .await
            .map_err(|e| TracerError::from_transport(&operation, e))?;

        if !response.status().is_success() {
            return Err(TracerError::Explorer {
                chain_id: chain.chain_id,
                message: format!("{} returned HTTP {}", operation, response.status()),
            });
        }

        response
            .json::<ExplorerEnvelope>()
            .await
            .map_err(|e| TracerError::MalformedResponse(format!("{}: {}", operation, e)))
    }
}

#[async_trait]
impl ExplorerClient for EtherscanClient {
    async fn fetch_transaction_receipt(
        &self,
        chain: &ChainConfig,
        tx_hash: &str,
    ) -> TracerResult<Option<Value>> {
        let envelope = self
            .call(chain, "proxy", "eth_getTransactionReceipt", tx_hash)
            .await?;
        receipt_from_envelope(chain.chain_id, envelope)
    }

    async fn fetch_transaction_logs(
        &self,
        chain: &ChainConfig,
        tx_hash: &str,
    ) -> TracerResult<Vec<Value>> {
        let envelope = self.call(chain, "logs", "getLogs", tx_hash).await?;
        logs_from_envelope(chain.chain_id, envelope)
    }
}

/// Query string of one Etherscan-style lookup keyed by transaction hash
fn explorer_query<'a>(
    chain: &'a ChainConfig,
    module: &'a str,
    action: &'a str,
    tx_hash: &'a str,
) -> [(&'static str, &'a str); 4] {
    [
        ("module", module),
        ("action", action),
        ("txhash", tx_hash),
        ("apikey", chain.explorer_api_key.as_str()),
    ]
}

fn receipt_from_envelope(chain_id: u64, envelope: ExplorerEnvelope) -> TracerResult<Option<Value>> {
    match envelope.into_result(chain_id)? {
        Value::Null => Ok(None),
        receipt @ Value::Object(_) => Ok(Some(receipt)),
        // Rate limits and bad keys arrive as a plain string result
        Value::String(message) => Err(TracerError::Explorer { chain_id, message }),
        other => Err(TracerError::MalformedResponse(format!(
            "unexpected receipt payload: {}",
            other
        ))),
    }
}

fn logs_from_envelope(chain_id: u64, envelope: ExplorerEnvelope) -> TracerResult<Vec<Value>> {
    let status = envelope.status.clone();
    let message = envelope.message.clone().unwrap_or_default();

    match envelope.into_result(chain_id)? {
        Value::Array(logs) => Ok(logs),
        Value::Null => Ok(Vec::new()),
        other if status.as_deref() == Some("0") && message.contains("No records found") => {
            debug!(chain_id, "Explorer reported no logs: {}", other);
            Ok(Vec::new())
        }
        Value::String(detail) => Err(TracerError::Explorer {
            chain_id,
            message: format!("{}: {}", message, detail),
        }),
        other => Err(TracerError::MalformedResponse(format!(
            "unexpected logs payload: {}",
            other
        ))),
    }
}

/// Parse an EVM quantity given as a JSON number, hex string or decimal string
pub fn parse_quantity(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) if !hex.is_empty() => u64::from_str_radix(hex, 16).ok(),
                Some(_) => None,
                None => s.parse().ok(),
            }
        }
        _ => None,
    }
}

/// Whether a receipt's `status` field is truthy
pub fn receipt_succeeded(receipt: &Value) -> bool {
    match receipt.get("status") {
        Some(Value::Bool(ok)) => *ok,
        Some(status) => parse_quantity(status).is_some_and(|s| s != 0),
        None => false,
    }
}

/// Block timestamp carried by a receipt or an explorer log entry
pub fn block_timestamp(entry: &Value) -> Option<i64> {
    ["timeStamp", "blockTimestamp", "timestamp"]
        .iter()
        .find_map(|key| entry.get(*key).and_then(parse_quantity))
        .and_then(|ts| i64::try_from(ts).ok())
}
