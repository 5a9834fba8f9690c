//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Every section has
//! defaults so a minimal file only names the chains it wants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::queue::policy::{Backoff, RetryPolicy};

/// Root configuration for the wallet engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// RPC endpoints keyed by chain name ("ethereum", "polygon", ...).
    pub chains: BTreeMap<String, ChainEndpointConfig>,

    /// Token overrides keyed by currency ("USDT_ETH", ...).
    pub tokens: BTreeMap<String, TokenConfig>,

    /// Platform signing wallet.
    pub platform_wallet: PlatformWalletConfig,

    /// Per job type worker and retry settings.
    pub queues: QueuesConfig,

    /// Ledger store settings.
    pub ledger: LedgerConfig,

    /// Operations API.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// RPC endpoint for one chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainEndpointConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Expected chain ID (1 for Ethereum mainnet, 137 for Polygon, ...). 0 skips the check.
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Blocks a receipt must be buried under before a deposit counts.
    pub confirmation_blocks: u64,
}

impl Default for ChainEndpointConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 0,
            rpc_timeout_secs: 10,
            confirmation_blocks: 0,
        }
    }
}

/// Token contract and precision.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// ERC-20 contract address. Native currencies leave this unset.
    pub contract_address: Option<String>,

    /// Base-unit decimals; the currency default applies when unset.
    pub decimals: Option<u32>,
}

/// Platform signing wallet configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlatformWalletConfig {
    /// Environment variable holding the hex private key. The key itself is never
    /// read from the config file.
    pub private_key_env: String,

    /// Timeout for a single submission in seconds.
    pub submit_timeout_secs: u64,
}

impl Default for PlatformWalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: "WALLET_ENGINE_PLATFORM_KEY".to_string(),
            submit_timeout_secs: 30,
        }
    }
}

/// Worker pool and retry settings for one job type.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Concurrent workers pulling from this queue.
    pub concurrency: usize,

    /// Total delivery attempts, including the first.
    pub max_attempts: u32,

    /// Delay curve between attempts.
    pub backoff: Backoff,
}

impl QueueConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.backoff)
    }

    fn from_policy(concurrency: usize, policy: RetryPolicy) -> Self {
        Self {
            concurrency,
            max_attempts: policy.max_attempts,
            backoff: policy.backoff,
        }
    }
}

fn default_verify_deposit() -> QueueConfig {
    QueueConfig::from_policy(4, RetryPolicy::deposit_verification())
}

fn default_process_withdrawal() -> QueueConfig {
    QueueConfig::from_policy(2, RetryPolicy::once())
}

fn default_process_prize_payout() -> QueueConfig {
    QueueConfig::from_policy(2, RetryPolicy::prize_payout())
}

/// Queue settings per job type. A section that is present must be complete.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueuesConfig {
    #[serde(default = "default_verify_deposit")]
    pub verify_deposit: QueueConfig,

    #[serde(default = "default_process_withdrawal")]
    pub process_withdrawal: QueueConfig,

    #[serde(default = "default_process_prize_payout")]
    pub process_prize_payout: QueueConfig,

    /// Where unprocessed jobs are saved on shutdown.
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            verify_deposit: default_verify_deposit(),
            process_withdrawal: default_process_withdrawal(),
            process_prize_payout: default_process_prize_payout(),
            snapshot_path: None,
        }
    }
}

/// Ledger store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Snapshot file loaded at startup and written on shutdown.
    pub snapshot_path: Option<String>,

    /// Deadline for a single ledger call in seconds.
    pub store_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            store_timeout_secs: 5,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,

    /// Seconds a withdrawal or payout may sit in PROCESSING before it is listed for review.
    pub review_after_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
            review_after_secs: 900,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) used when RUST_LOG is unset.
    pub log_level: String,

    /// "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
