//! Job failure taxonomy.

use thiserror::Error;
use uuid::Uuid;

use crate::chain::types::ChainError;
use crate::ledger::asset::Chain;
use crate::ledger::store::LedgerError;
use crate::resilience::timeouts::Elapsed;

/// Why a job handler did not finish its work.
///
/// Retryable variants return the job to the queue for a backoff redelivery. Terminal
/// variants are final regardless of the remaining attempt budget.
#[derive(Debug, Error)]
pub enum JobError {
    /// Missing provider, signer or other setup problem.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transaction not yet mined")]
    NotYetMined,

    #[error("awaiting confirmations ({current}/{required})")]
    Confirming { current: u64, required: u64 },

    #[error("transaction reverted on-chain")]
    Reverted,

    #[error("network error: {0}")]
    Network(String),

    #[error("user {user_id} has no primary wallet on {chain}")]
    MissingWallet { user_id: String, chain: Chain },

    /// External submission failed or its outcome is unknown. Needs manual review.
    #[error("submission failed: {0}")]
    Submission(String),

    /// Funds may have moved but the ledger does not say so. Never redelivered.
    #[error("transaction {transaction_id} unresolved: {detail}")]
    Unresolved { transaction_id: Uuid, detail: String },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Rejected(String),
}

impl JobError {
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::NotYetMined
            | JobError::Confirming { .. }
            | JobError::Network(_)
            | JobError::MissingWallet { .. } => true,
            JobError::Ledger(e) => e.is_transient(),
            JobError::Configuration(_)
            | JobError::Reverted
            | JobError::Submission(_)
            | JobError::Unresolved { .. }
            | JobError::Rejected(_) => false,
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            JobError::Configuration(_) => "configuration",
            JobError::NotYetMined => "not_yet_mined",
            JobError::Confirming { .. } => "confirming",
            JobError::Reverted => "reverted",
            JobError::Network(_) => "network",
            JobError::MissingWallet { .. } => "missing_wallet",
            JobError::Submission(_) => "submission",
            JobError::Unresolved { .. } => "unresolved",
            JobError::Ledger(_) => "ledger",
            JobError::Rejected(_) => "rejected",
        }
    }
}

impl From<ChainError> for JobError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::InvalidTxHash(_) => JobError::Rejected(err.to_string()),
            ChainError::InvalidUrl(_) => JobError::Configuration(err.to_string()),
            _ => JobError::Network(err.to_string()),
        }
    }
}

impl From<Elapsed> for JobError {
    fn from(err: Elapsed) -> Self {
        JobError::Network(err.to_string())
    }
}
