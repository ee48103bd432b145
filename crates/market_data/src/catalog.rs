//! Token universe per network.

use common::config::NetworkConfig;
use common::{MarketKey, NetworkId, TokenInfo};

/// Source of the assets an orchestrator tracks.
pub trait TokenCatalog: Send + Sync {
    /// Tokens listed on a network, in display order.
    fn tokens(&self, network_id: &NetworkId) -> Vec<TokenInfo>;

    /// Lending pool for a network.
    fn pool_id(&self, network_id: &NetworkId) -> Option<String>;

    /// One market key per listed token.
    fn market_keys(&self, network_id: &NetworkId) -> Vec<(MarketKey, TokenInfo)> {
        let Some(pool_id) = self.pool_id(network_id) else {
            return Vec::new();
        };
        self.tokens(network_id)
            .into_iter()
            .map(|token| {
                let key = MarketKey::new(network_id.clone(), pool_id.clone(), token.asset_id.clone());
                (key, token)
            })
            .collect()
    }
}

/// Catalog backed by the `networks` section of the config.
#[derive(Debug, Clone, Default)]
pub struct ConfigTokenCatalog {
    networks: Vec<NetworkConfig>,
}

impl ConfigTokenCatalog {
    pub fn new(networks: Vec<NetworkConfig>) -> Self {
        Self { networks }
    }

    fn network(&self, network_id: &NetworkId) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| &n.id == network_id)
    }
}

impl TokenCatalog for ConfigTokenCatalog {
    fn tokens(&self, network_id: &NetworkId) -> Vec<TokenInfo> {
        self.network(network_id)
            .map(|n| n.tokens.clone())
            .unwrap_or_default()
    }

    fn pool_id(&self, network_id: &NetworkId) -> Option<String> {
        self.network(network_id).map(|n| n.pool_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MonitorConfig;

    #[test]
    fn test_default_config_catalog_keys() {
        let cfg = MonitorConfig::default();
        let catalog = ConfigTokenCatalog::new(cfg.networks.clone());

        let keys = catalog.market_keys(&cfg.network);
        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(|(k, _)| k.network_id == cfg.network));
        assert_eq!(keys[0].0.asset_id, "USDC");
        assert_eq!(keys[0].1.decimals, 6);
    }

    #[test]
    fn test_unknown_network_is_empty() {
        let catalog = ConfigTokenCatalog::new(MonitorConfig::default().networks);
        let unknown = NetworkId::new("devnet");
        assert!(catalog.tokens(&unknown).is_empty());
        assert!(catalog.pool_id(&unknown).is_none());
        assert!(catalog.market_keys(&unknown).is_empty());
    }
}
