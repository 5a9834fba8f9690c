//! Chain read-side types and error definitions.

use thiserror::Error;

/// Errors that can occur while querying a chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Hash is not a 32-byte hex string.
    #[error("Invalid transaction hash '{0}'")]
    InvalidTxHash(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Invalid RPC URL '{0}'")]
    InvalidUrl(String),
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// What a receipt lookup found for a transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptOutcome {
    /// Mined, succeeded, and buried under the required block depth.
    Success { block_number: u64 },
    /// Mined with a failed status.
    Reverted,
    /// No receipt yet.
    NotFoundYet,
    /// Mined and succeeded but not yet deep enough.
    Confirming { current: u64, required: u64 },
}
