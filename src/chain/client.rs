//! Chain RPC client with failover and timeouts.
//!
//! # Responsibilities
//! - Connect to the configured JSON-RPC endpoints for one chain
//! - Look up receipts and judge confirmation depth
//! - Report provider health

use alloy::primitives::TxHash;
use alloy::providers::{Provider, ProviderBuilder};
use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::chain::types::{ChainError, ChainResult, ReceiptOutcome};
use crate::config::schema::ChainEndpointConfig;
use crate::ledger::asset::Chain;
use crate::observability::metrics;

/// Read access to transaction receipts on one chain.
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    async fn receipt(&self, tx_hash: &str) -> ChainResult<ReceiptOutcome>;

    /// Whether the chain is reachable right now.
    async fn is_healthy(&self) -> bool {
        true
    }
}

/// Judge a mined receipt against the required depth.
pub fn classify_receipt(succeeded: bool, receipt_block: Option<u64>, current_block: u64, required: u64) -> ReceiptOutcome {
    if !succeeded {
        return ReceiptOutcome::Reverted;
    }
    let block_number = receipt_block.unwrap_or(current_block);
    let confirmations = current_block.saturating_sub(block_number);
    if confirmations >= required {
        ReceiptOutcome::Success { block_number }
    } else {
        ReceiptOutcome::Confirming {
            current: confirmations,
            required,
        }
    }
}

/// JSON-RPC client for one chain (primary + failovers).
#[derive(Clone)]
pub struct ChainClient {
    chain: Chain,
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    config: ChainEndpointConfig,
    timeout_duration: Duration,
}

impl ChainClient {
    /// Create a client. Unreachable endpoints do not fail construction.
    pub async fn new(chain: Chain, config: ChainEndpointConfig) -> ChainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config
            .rpc_url
            .parse()
            .map_err(|_| ChainError::InvalidUrl(config.rpc_url.clone()))?;
        providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url)) as Arc<dyn Provider + Send + Sync>);

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Arc::new(ProviderBuilder::new().connect_http(url)) as Arc<dyn Provider + Send + Sync>);
            } else {
                tracing::warn!(chain = %chain, url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            chain,
            providers,
            config,
            timeout_duration,
        };

        if client.config.chain_id != 0 {
            match client.verify_chain_id().await {
                Ok(()) => tracing::info!(chain = %chain, chain_id = client.config.chain_id, "Chain client initialized"),
                Err(e) => tracing::warn!(chain = %chain, error = %e, "Chain client initialized but chain verification failed"),
            }
        } else {
            tracing::info!(chain = %chain, rpc_url = %client.config.rpc_url, "Chain client initialized");
        }

        Ok(client)
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    /// Try each provider in order until one answers.
    async fn first_ok<T, E, F, Fut>(&self, operation: &'static str, call: F) -> ChainResult<T>
    where
        E: Display,
        F: Fn(Arc<dyn Provider + Send + Sync>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, call(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(chain = %self.chain, provider_idx = i, operation, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(chain = %self.chain, provider_idx = i, operation, "RPC timeout, trying next provider");
                }
            }
        }
        Err(ChainError::Rpc(format!("All RPC providers failed: {}", operation)))
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> ChainResult<()> {
        let actual = self.get_chain_id().await?;
        if actual != self.config.chain_id {
            return Err(ChainError::ChainMismatch {
                expected: self.config.chain_id,
                actual,
            });
        }
        Ok(())
    }

    pub async fn get_chain_id(&self) -> ChainResult<u64> {
        self.first_ok("get_chain_id", |p| async move { p.get_chain_id().await }).await
    }

    pub async fn get_block_number(&self) -> ChainResult<u64> {
        self.first_ok("get_block_number", |p| async move { p.get_block_number().await })
            .await
    }
}

#[async_trait]
impl ReceiptSource for ChainClient {
    async fn receipt(&self, tx_hash: &str) -> ChainResult<ReceiptOutcome> {
        let hash: TxHash = tx_hash
            .parse()
            .map_err(|_| ChainError::InvalidTxHash(tx_hash.to_string()))?;

        let receipt = self
            .first_ok("get_transaction_receipt", |p| async move { p.get_transaction_receipt(hash).await })
            .await?;
        let Some(receipt) = receipt else {
            return Ok(ReceiptOutcome::NotFoundYet);
        };

        let required = self.config.confirmation_blocks;
        let current_block = if required == 0 || !receipt.status() {
            receipt.block_number.unwrap_or_default()
        } else {
            self.get_block_number().await?
        };
        Ok(classify_receipt(receipt.status(), receipt.block_number, current_block, required))
    }

    async fn is_healthy(&self) -> bool {
        let healthy = self.get_block_number().await.is_ok();
        metrics::record_provider_health(self.chain.as_str(), healthy);
        healthy
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("chain", &self.chain)
            .field("rpc_url", &self.config.rpc_url)
            .field("providers", &self.providers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> ChainEndpointConfig {
        ChainEndpointConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            failover_urls: vec!["not a url".to_string()],
            chain_id: 31337,
            rpc_timeout_secs: 1,
            confirmation_blocks: 3,
        }
    }

    #[test]
    fn test_classify_receipt() {
        assert_eq!(classify_receipt(false, Some(10), 20, 3), ReceiptOutcome::Reverted);
        assert_eq!(
            classify_receipt(true, Some(10), 11, 3),
            ReceiptOutcome::Confirming { current: 1, required: 3 }
        );
        assert_eq!(classify_receipt(true, Some(10), 13, 3), ReceiptOutcome::Success { block_number: 10 });
        assert_eq!(classify_receipt(true, Some(10), 10, 0), ReceiptOutcome::Success { block_number: 10 });
    }

    #[tokio::test]
    async fn test_client_creation_tolerates_unreachable_rpc() {
        let client = ChainClient::new(Chain::Ethereum, unreachable_config()).await.unwrap();
        assert_eq!(client.providers.len(), 1);
        assert!(client.get_block_number().await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_primary_url() {
        let mut config = unreachable_config();
        config.rpc_url = "nope".to_string();
        assert!(matches!(
            ChainClient::new(Chain::Polygon, config).await,
            Err(ChainError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_hash_rejected() {
        let client = ChainClient::new(Chain::Ethereum, unreachable_config()).await.unwrap();
        assert!(matches!(client.receipt("0x1234").await, Err(ChainError::InvalidTxHash(_))));
    }
}
