//! Chain module - static chain metadata and explorer access
//!
//! This module provides:
//! - The immutable chain registry built from configuration
//! - An Etherscan-compatible explorer client for receipts and logs
//! - Helpers for reading EVM quantities out of explorer JSON

pub mod explorer;
pub mod registry;

pub use explorer::{block_timestamp, parse_quantity, receipt_succeeded, EtherscanClient, ExplorerClient};
pub use registry::ChainRegistry;
