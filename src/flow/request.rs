//! Caller-supplied description of one flow to verify

use crate::error::{TracerError, TracerResult};

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Everything needed to trace one origin transaction through to its callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRequest {
    pub origin_tx_hash: String,
    /// Reactive contract whose activity is traced
    pub reactive_contract: String,
    /// Topic0 of the expected event, already hashed
    pub event_signature: String,
    pub origin_chain_id: u64,
    pub destination_chain_id: u64,
}

impl FlowRequest {
    /// Syntactic checks on hashes and addresses; no I/O
    pub fn validate(&self) -> TracerResult<()> {
        B256::from_str(&self.origin_tx_hash).map_err(|e| {
            TracerError::InvalidRequest(format!(
                "origin transaction hash {:?}: {}",
                self.origin_tx_hash, e
            ))
        })?;
        Address::from_str(&self.reactive_contract).map_err(|e| {
            TracerError::InvalidRequest(format!(
                "reactive contract {:?}: {}",
                self.reactive_contract, e
            ))
        })?;
        B256::from_str(&self.event_signature).map_err(|e| {
            TracerError::InvalidRequest(format!(
                "event signature {:?}: {}",
                self.event_signature, e
            ))
        })?;
        Ok(())
    }
}

/// Compare a log topic against an event signature, ignoring hex case
pub fn topic_matches(topic: &str, signature: &str) -> bool {
    match (B256::from_str(topic), B256::from_str(signature)) {
        (Ok(a), Ok(b)) => a == b,
        _ => topic.eq_ignore_ascii_case(signature),
    }
}

#[cfg(test)]
pub(crate) fn test_request(origin_chain_id: u64, destination_chain_id: u64) -> FlowRequest {
    FlowRequest {
        origin_tx_hash: format!("0x{}", "a1".repeat(32)),
        reactive_contract: format!("0x{}", "be".repeat(20)),
        event_signature: format!("0x{}", "DD".repeat(32)),
        origin_chain_id,
        destination_chain_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        assert!(test_request(1, 2).validate().is_ok());
    }

    #[test]
    fn test_invalid_fields_rejected() {
        let mut request = test_request(1, 2);
        request.origin_tx_hash = "0x1234".into();
        assert!(matches!(
            request.validate(),
            Err(TracerError::InvalidRequest(_))
        ));

        let mut request = test_request(1, 2);
        request.reactive_contract = "not-an-address".into();
        assert!(request.validate().is_err());

        let mut request = test_request(1, 2);
        request.event_signature = String::new();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_topic_match_ignores_case() {
        let upper = format!("0x{}", "ABCD".repeat(16));
        let lower = format!("0x{}", "abcd".repeat(16));
        assert!(topic_matches(&lower, &upper));
        assert!(topic_matches(&upper, &lower));
        assert!(!topic_matches(&lower, &format!("0x{}", "abce".repeat(16))));
    }

    #[test]
    fn test_topic_match_falls_back_to_text() {
        assert!(topic_matches("0xAB", "0xab"));
        assert!(!topic_matches("0xab", "0xac"));
    }

    #[test]
    fn test_request_wire_format() {
        let request: FlowRequest = serde_json::from_value(serde_json::json!({
            "originTxHash": "0x01",
            "reactiveContract": "0x02",
            "eventSignature": "0x03",
            "originChainId": 11155111,
            "destinationChainId": 84532
        }))
        .unwrap();
        assert_eq!(request.origin_chain_id, 11155111);
        assert_eq!(request.destination_chain_id, 84532);
    }
}
