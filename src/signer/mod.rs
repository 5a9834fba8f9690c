//! Outbound payment signing.
//!
//! # Data Flow
//! ```text
//! Environment variable (private key)
//!     → wallet.rs (key loading)
//!     → evm.rs (one signing provider per EVM chain, serialized submissions)
//!     → withdrawal and prize payout workers
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data

pub mod evm;
pub mod wallet;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::ledger::asset::{Chain, Currency};

pub use evm::EvmSigner;
pub use wallet::PlatformWallet;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Platform wallet not configured")]
    NotConfigured,

    #[error("Invalid private key format: {0}")]
    InvalidKey(String),

    #[error("No signing provider for chain {0}")]
    UnsupportedChain(Chain),

    #[error("{currency} cannot be sent on {chain}")]
    UnsupportedCurrency { currency: Currency, chain: Chain },

    #[error("No token contract configured for {0}")]
    NoTokenContract(Currency),

    #[error("Invalid destination address '{0}'")]
    InvalidAddress(String),

    #[error("Amount {amount} is not representable with {decimals} decimals")]
    AmountPrecision { amount: Decimal, decimals: u32 },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Submission timed out after {0} seconds")]
    Timeout(u64),
}

pub type SignerResult<T> = Result<T, SignerError>;

/// A single outbound transfer from the platform wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub to_address: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub chain: Chain,
}

/// Capability to sign and broadcast a payment, returning the transaction hash.
///
/// A returned error does not prove nothing was broadcast. Callers must not resubmit
/// automatically.
#[async_trait]
pub trait PaymentSigner: Send + Sync {
    async fn submit(&self, request: &PaymentRequest) -> SignerResult<String>;
}
