//! Receipt providers keyed by chain.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::chain::client::{ChainClient, ReceiptSource};
use crate::config::schema::EngineConfig;
use crate::ledger::asset::Chain;

/// Immutable after startup; cloned handles share the providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Chain, Arc<dyn ReceiptSource>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a client for every configured chain. Chains that cannot be set up are
    /// logged and skipped; jobs for them fail with a configuration error.
    pub async fn connect(config: &EngineConfig) -> Self {
        let mut registry = Self::new();
        for (name, endpoint) in &config.chains {
            let chain = match name.parse::<Chain>() {
                Ok(chain) if chain.is_evm() => chain,
                Ok(chain) => {
                    tracing::warn!(chain = %chain, "No receipt provider for non-EVM chain");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(chain = %name, error = %e, "Skipping unknown chain");
                    continue;
                }
            };
            match ChainClient::new(chain, endpoint.clone()).await {
                Ok(client) => registry.providers.insert(chain, Arc::new(client)),
                Err(e) => {
                    tracing::error!(chain = %chain, error = %e, "Failed to create chain client");
                    continue;
                }
            };
        }
        tracing::info!(chains = ?registry.chains(), "Provider registry ready");
        registry
    }

    pub fn with_provider(mut self, chain: Chain, provider: Arc<dyn ReceiptSource>) -> Self {
        self.providers.insert(chain, provider);
        self
    }

    pub fn get(&self, chain: Chain) -> Option<Arc<dyn ReceiptSource>> {
        self.providers.get(&chain).cloned()
    }

    /// Configured chains in declaration order.
    pub fn chains(&self) -> Vec<Chain> {
        Chain::ALL
            .iter()
            .copied()
            .filter(|chain| self.providers.contains_key(chain))
            .collect()
    }

    /// Check every provider.
    pub async fn health_check(&self) -> BTreeMap<Chain, bool> {
        let mut report = BTreeMap::new();
        for chain in self.chains() {
            if let Some(provider) = self.providers.get(&chain) {
                report.insert(chain, provider.is_healthy().await);
            }
        }
        report
    }
}
