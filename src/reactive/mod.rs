//! Reactive network access
//!
//! The reactive layer (RVM) is observed only through its JSON-RPC surface:
//! address to RVM id mapping, the RVM's own transaction log, and the
//! callback transactions it emitted.

pub mod rpc;

pub use rpc::{ReactiveRpc, ReactiveRpcClient};

use crate::chain::parse_quantity;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Result of `rnk_getRnkAddressMapping`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RvmMapping {
    pub rvm_id: String,
}

/// A transaction executed inside the reactive VM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RvmTransaction {
    pub hash: String,
    /// Unix time, seconds
    #[serde(default, deserialize_with = "deserialize_time")]
    pub time: Option<i64>,
    /// Origin-chain transaction that triggered this RVM transaction
    #[serde(default)]
    pub ref_tx: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RvmTransaction {
    pub fn references(&self, origin_tx_hash: &str) -> bool {
        self.ref_tx
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(origin_tx_hash))
    }
}

/// A callback transaction issued by the reactive layer toward a destination chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallbackTransaction {
    /// Transaction hash on the destination chain
    pub hash: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn deserialize_time<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(parse_quantity)
        .and_then(|t| i64::try_from(t).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rvm_transaction_decoding() {
        let tx: RvmTransaction = serde_json::from_value(json!({
            "hash": "0xrvm",
            "time": "0x6553f100",
            "refTx": "0xABCDEF",
            "refChainId": 11155111,
            "status": 1
        }))
        .unwrap();

        assert_eq!(tx.time, Some(0x6553f100));
        assert!(tx.references("0xabcdef"));
        assert!(!tx.references("0xabcde0"));
        assert_eq!(tx.extra.get("refChainId"), Some(&json!(11155111)));
    }

    #[test]
    fn test_rvm_transaction_without_optional_fields() {
        let tx: RvmTransaction = serde_json::from_value(json!({ "hash": "0x1" })).unwrap();
        assert_eq!(tx.time, None);
        assert!(!tx.references("0x1"));
    }

    #[test]
    fn test_callback_keeps_extra_fields() {
        let cb: CallbackTransaction = serde_json::from_value(json!({
            "hash": "0xdest",
            "chainId": 84532
        }))
        .unwrap();

        let encoded = serde_json::to_value(&cb).unwrap();
        assert_eq!(encoded["hash"], "0xdest");
        assert_eq!(encoded["chainId"], 84532);
    }
}
