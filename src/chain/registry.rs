//! Immutable chain table keyed by chain id

use crate::config::{ChainConfig, Settings};

use std::collections::BTreeMap;

/// Lookup table of every chain the tracer knows about.
///
/// Pure data: validation of what a chain may be used for happens in the
/// flow controller, not here.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: BTreeMap<u64, ChainConfig>,
}

impl ChainRegistry {
    /// Build a registry from an explicit list of chain configs
    pub fn new(chains: impl IntoIterator<Item = ChainConfig>) -> Self {
        Self {
            chains: chains.into_iter().map(|c| (c.chain_id, c)).collect(),
        }
    }

    /// Build the registry from loaded settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.chains.values().cloned())
    }

    /// Get chain config by chain ID
    pub fn get(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.get(&chain_id)
    }

    /// All chains, ordered by chain id
    pub fn chains(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn test_chain(chain_id: u64, callback_proxy: Option<&str>) -> ChainConfig {
    ChainConfig {
        chain_id,
        name: format!("chain-{}", chain_id),
        rpc_url: format!("https://rpc.chain-{}.test", chain_id),
        explorer_url: format!("https://explorer.chain-{}.test", chain_id),
        explorer_api_key: "test-key".to_string(),
        explorer_api_url: format!("https://api.chain-{}.test/api", chain_id),
        callback_proxy: callback_proxy.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_registry() -> ChainRegistry {
        let settings = Settings::from_toml_str(include_str!("../../config/default.toml")).unwrap();
        ChainRegistry::from_settings(&settings)
    }

    #[test]
    fn test_lookup_and_absence() {
        let registry = ChainRegistry::new(vec![
            test_chain(1, Some("0x01")),
            test_chain(2, None),
        ]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(1).unwrap().callback_proxy.as_deref(), Some("0x01"));
        assert!(registry.get(2).unwrap().callback_proxy.is_none());
        assert!(registry.get(3).is_none());
    }

    #[test]
    fn test_default_table_covers_supported_networks() {
        let registry = default_registry();

        // Ethereum, Avalanche, Arbitrum, Manta, Base, BSC, Polygon PoS,
        // Polygon zkEVM, opBNB and the reactive testnet
        for chain_id in [
            1, 11155111, 43114, 43113, 42161, 421614, 169, 3441006, 8453, 84532, 56, 97, 137,
            80002, 1101, 2442, 204, 5611, 5318008,
        ] {
            assert!(registry.get(chain_id).is_some(), "missing chain {}", chain_id);
        }
    }

    #[test]
    fn test_default_table_callback_proxies() {
        let registry = default_registry();

        assert!(registry.get(11155111).unwrap().supports_callbacks());
        assert!(registry.get(1).unwrap().supports_callbacks());
        assert!(!registry.get(137).unwrap().supports_callbacks());
        assert!(!registry.get(5318008).unwrap().supports_callbacks());
    }

    #[test]
    fn test_chains_are_ordered() {
        let registry = default_registry();
        let ids: Vec<u64> = registry.chains().map(|c| c.chain_id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}
