//! JSON-RPC 2.0 client for the reactive network endpoint

use super::{CallbackTransaction, RvmMapping, RvmTransaction};
use crate::error::{TracerError, TracerResult};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Reactive network queries used by the flow controller
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReactiveRpc: Send + Sync {
    /// Resolve a reactive contract address to its RVM id
    async fn get_rvm_id(&self, address: &str) -> TracerResult<String>;

    /// A batch of the RVM's transactions anchored at `pivot_time`
    async fn get_transactions(
        &self,
        rvm_id: &str,
        pivot_time: i64,
        batch_size: u32,
    ) -> TracerResult<Vec<RvmTransaction>>;

    /// Callback transactions produced by one RVM transaction
    async fn get_callback_transactions(
        &self,
        rvm_id: &str,
        rsc_tx_hash: &str,
    ) -> TracerResult<Vec<CallbackTransaction>>;
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: i64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// HTTP JSON-RPC client bound to one reactive network endpoint
pub struct ReactiveRpcClient {
    client: reqwest::Client,
    url: String,
}

impl ReactiveRpcClient {
    /// Create a client with a per-request timeout
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> TracerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TracerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> TracerResult<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: chrono::Utc::now().timestamp_millis(),
            method,
            params,
        };
        debug!(method, id = request.id, "Reactive RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TracerError::from_transport(method, e))?;

        if !response.status().is_success() {
            return Err(TracerError::Rpc {
                method: method.to_string(),
                code: i64::from(response.status().as_u16()),
                message: format!("HTTP {}", response.status()),
            });
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| TracerError::MalformedResponse(format!("{}: {}", method, e)))?;

        decode_result(method, body)
    }
}

fn decode_result<T: DeserializeOwned>(method: &str, body: RpcResponse) -> TracerResult<T> {
    if let Some(error) = body.error {
        return Err(TracerError::Rpc {
            method: method.to_string(),
            code: error.code,
            message: error.message,
        });
    }

    serde_json::from_value(body.result)
        .map_err(|e| TracerError::MalformedResponse(format!("{}: {}", method, e)))
}

#[async_trait]
impl ReactiveRpc for ReactiveRpcClient {
    async fn get_rvm_id(&self, address: &str) -> TracerResult<String> {
        let mapping: RvmMapping = self
            .call("rnk_getRnkAddressMapping", json!([address]))
            .await?;
        Ok(mapping.rvm_id)
    }

    async fn get_transactions(
        &self,
        rvm_id: &str,
        pivot_time: i64,
        batch_size: u32,
    ) -> TracerResult<Vec<RvmTransaction>> {
        let txs: Option<Vec<RvmTransaction>> = self
            .call("rnk_getTransactions", json!([rvm_id, pivot_time, batch_size]))
            .await?;
        Ok(txs.unwrap_or_default())
    }

    async fn get_callback_transactions(
        &self,
        rvm_id: &str,
        rsc_tx_hash: &str,
    ) -> TracerResult<Vec<CallbackTransaction>> {
        let callbacks: Option<Vec<CallbackTransaction>> = self
            .call("rnk_getCallbackTransaction", json!([rvm_id, rsc_tx_hash]))
            .await?;
        Ok(callbacks.unwrap_or_default())
    }
}
