//! Ledger store contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::asset::{Chain, Currency};
use crate::ledger::types::{
    NewTransaction, Transaction, TransactionPatch, TransactionStatus, TransactionType, WalletAccount,
};

/// Errors raised by a ledger store.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transaction {0} not found")]
    NotFound(Uuid),

    #[error("transaction hash {0} already recorded")]
    DuplicateTxHash(String),

    #[error("invalid status transition {from} -> {to} for transaction {id}")]
    InvalidTransition {
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("transaction {0} is terminal and cannot be modified")]
    Terminal(Uuid),

    #[error("ledger call timed out after {0} seconds")]
    Timeout(u64),

    #[error("ledger persistence error: {0}")]
    Persistence(String),
}

impl LedgerError {
    /// Transient store failures may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Timeout(_) | LedgerError::Persistence(_))
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Outcome of an idempotent create.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(Transaction),
    /// A row with the same reference key already existed; nothing was written.
    Existing(Transaction),
}

/// Optional filters for transaction listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub currency: Option<Currency>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.kind.map_or(true, |k| tx.kind == k)
            && self.status.map_or(true, |s| tx.status == s)
            && self.currency.map_or(true, |c| tx.currency == c)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    CreatedAt,
    Amount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Pagination and ordering of a listing. Pages are 1-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
    pub sort_by: SortField,
    pub order: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            sort_by: SortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit,
            ..Self::default()
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.limit as usize)
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: &PageRequest, total: usize) -> Self {
        let limit = request.limit.max(1) as usize;
        Self {
            items,
            page: request.page,
            limit: request.limit,
            total,
            total_pages: total.div_ceil(limit),
        }
    }
}

/// Durable record of transactions and wallet accounts.
///
/// Every status change goes through [`LedgerStore::update_transaction_if`], which applies
/// the patch only when the row is currently in one of the expected statuses. Stores also
/// enforce the transition table, so a forbidden edge is an error even when the guard matches.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_transaction(&self, new: NewTransaction) -> LedgerResult<Transaction>;

    /// Create a row unless one with the same reference key exists. Rows without a
    /// reference key are always created.
    async fn create_transaction_unique(&self, new: NewTransaction) -> LedgerResult<CreateOutcome>;

    async fn get_transaction(&self, id: Uuid) -> LedgerResult<Option<Transaction>>;

    async fn find_by_tx_hash(&self, tx_hash: &str) -> LedgerResult<Option<Transaction>>;

    /// Compare-and-set on status. Returns `false` when the guard did not match.
    async fn update_transaction_if(
        &self,
        id: Uuid,
        expected: &[TransactionStatus],
        patch: TransactionPatch,
    ) -> LedgerResult<bool>;

    async fn list_transactions(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        page: &PageRequest,
    ) -> LedgerResult<Page<Transaction>>;

    /// Every transaction owned by the user, unordered. Used for balance snapshots.
    async fn user_transactions(&self, user_id: &str) -> LedgerResult<Vec<Transaction>>;

    async fn transactions_with(
        &self,
        kinds: &[TransactionType],
        statuses: &[TransactionStatus],
    ) -> LedgerResult<Vec<Transaction>>;

    /// The user's primary wallet on a chain.
    async fn find_wallet_account(&self, user_id: &str, chain: Chain) -> LedgerResult<Option<WalletAccount>>;

    /// Register a wallet. A new primary demotes any previous primary on the same chain.
    async fn upsert_wallet_account(&self, account: WalletAccount) -> LedgerResult<()>;

    async fn register_entry(&self, tournament_id: &str, user_id: &str) -> LedgerResult<()>;

    /// Best-effort denormalized write. Returns `false` when no entry exists.
    async fn update_entry_annotation(&self, tournament_id: &str, user_id: &str, tx_hash: &str) -> LedgerResult<bool>;

    async fn entry_annotation(&self, tournament_id: &str, user_id: &str) -> LedgerResult<Option<String>>;
}
