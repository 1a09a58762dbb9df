//! Error types for the Reactive Flow Tracer

use thiserror::Error;

/// Main error type for the tracer
#[derive(Error, Debug)]
pub enum TracerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid flow request: {0}")]
    InvalidRequest(String),

    #[error("Chain {chain_id} is not supported")]
    UnsupportedChain { chain_id: u64 },

    #[error("Origin chain {chain_id} has no callback proxy configured")]
    OriginCallbackUnsupported { chain_id: u64 },

    #[error("Destination chain {chain_id} has no callback proxy configured")]
    DestinationCallbackUnsupported { chain_id: u64 },

    #[error("Origin transaction {tx_hash} not found or failed on chain {chain_id}")]
    OriginTxNotFound { chain_id: u64, tx_hash: String },

    #[error("Event {signature} not emitted by transaction {tx_hash}")]
    EventNotFound { tx_hash: String, signature: String },

    #[error("No reactive transaction references {tx_hash} within {window_secs}s of {timestamp}")]
    CaptureNotFound {
        tx_hash: String,
        timestamp: i64,
        window_secs: i64,
    },

    #[error("No callback transaction found for reactive transaction {rsc_tx_hash}")]
    NoCallbackFound { rsc_tx_hash: String },

    #[error("Destination transaction {tx_hash} not found or failed on chain {chain_id}")]
    DestinationTxFailed { chain_id: u64, tx_hash: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Explorer error for chain {chain_id}: {message}")]
    Explorer { chain_id: u64, message: String },

    #[error("Reactive RPC error in {method} (code {code}): {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Flow cancelled before {step}")]
    Cancelled { step: String },

    #[error("Invalid state transition for {step} from {from} to {to}")]
    InvalidStateTransition {
        step: String,
        from: String,
        to: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TracerError {
    /// Errors raised while building a controller; no flow status exists yet
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            TracerError::UnsupportedChain { .. }
                | TracerError::OriginCallbackUnsupported { .. }
                | TracerError::DestinationCallbackUnsupported { .. }
                | TracerError::InvalidRequest(_)
        )
    }

    /// Check if error came from the network layer rather than flow data
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            TracerError::Http(_)
                | TracerError::Explorer { .. }
                | TracerError::Rpc { .. }
                | TracerError::Timeout { .. }
                | TracerError::MalformedResponse(_)
        )
    }

    /// Short machine-readable name, used for metrics labels and API bodies
    pub fn kind(&self) -> &'static str {
        match self {
            TracerError::Config(_) => "config",
            TracerError::InvalidRequest(_) => "invalid_request",
            TracerError::UnsupportedChain { .. } => "unsupported_chain",
            TracerError::OriginCallbackUnsupported { .. } => "origin_callback_unsupported",
            TracerError::DestinationCallbackUnsupported { .. } => {
                "destination_callback_unsupported"
            }
            TracerError::OriginTxNotFound { .. } => "origin_tx_not_found",
            TracerError::EventNotFound { .. } => "event_not_found",
            TracerError::CaptureNotFound { .. } => "capture_not_found",
            TracerError::NoCallbackFound { .. } => "no_callback_found",
            TracerError::DestinationTxFailed { .. } => "destination_tx_failed",
            TracerError::Http(_) => "http",
            TracerError::Explorer { .. } => "explorer",
            TracerError::Rpc { .. } => "rpc",
            TracerError::MalformedResponse(_) => "malformed_response",
            TracerError::Timeout { .. } => "timeout",
            TracerError::Cancelled { .. } => "cancelled",
            TracerError::InvalidStateTransition { .. } => "invalid_state_transition",
            TracerError::Internal(_) => "internal",
        }
    }

    /// Map a reqwest failure, keeping timeouts distinct
    pub fn from_transport(operation: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TracerError::Timeout {
                operation: operation.to_string(),
            }
        } else {
            TracerError::Http(err)
        }
    }
}

/// Result type for tracer operations
pub type TracerResult<T> = Result<T, TracerError>;
