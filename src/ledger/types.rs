//! Ledger records: transactions, wallet accounts and tournament entries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::ledger::asset::{Chain, Currency};

/// Kind of financial movement a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    EntryFee,
    PrizeWin,
    Refund,
    DeveloperPayout,
    PlatformFee,
}

/// How a transaction moves a user's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Credit,
    Debit,
    /// Platform-side bookkeeping that never touches the user's balance.
    Neutral,
}

impl TransactionType {
    pub fn direction(&self) -> Direction {
        match self {
            TransactionType::Deposit | TransactionType::PrizeWin | TransactionType::Refund => {
                Direction::Credit
            }
            TransactionType::Withdrawal | TransactionType::EntryFee => Direction::Debit,
            TransactionType::DeveloperPayout | TransactionType::PlatformFee => Direction::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::EntryFee => "ENTRY_FEE",
            TransactionType::PrizeWin => "PRIZE_WIN",
            TransactionType::Refund => "REFUND",
            TransactionType::DeveloperPayout => "DEVELOPER_PAYOUT",
            TransactionType::PlatformFee => "PLATFORM_FEE",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a transaction.
///
/// ```text
/// PENDING ──▶ PROCESSING ──▶ COMPLETED
///    │                  └──▶ FAILED
///    └──▶ CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    /// No further transition is permitted from a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Cancelled
        )
    }

    /// Counted towards the "pending" balance bucket.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TransactionStatus::Pending | TransactionStatus::Processing)
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Cancelled) | (Processing, Completed) | (Processing, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single authoritative record of one financial movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Decimal,
    pub currency: Currency,
    pub tx_hash: Option<String>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub chain: Option<Chain>,
    pub status: TransactionStatus,
    /// Set only when the status is FAILED.
    pub failure_reason: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Signed effect on the owner's balance.
    pub fn delta(&self) -> Decimal {
        match self.kind.direction() {
            Direction::Credit => self.amount,
            Direction::Debit => -self.amount,
            Direction::Neutral => Decimal::ZERO,
        }
    }

    pub fn reference_key(&self) -> Option<ReferenceKey> {
        ReferenceKey::from_parts(
            &self.user_id,
            self.kind,
            self.reference_type.as_deref(),
            self.reference_id.as_deref(),
        )
    }
}

/// Fields supplied when a transaction row is created.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: String,
    pub kind: TransactionType,
    pub amount: Decimal,
    pub currency: Currency,
    pub tx_hash: Option<String>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub chain: Option<Chain>,
    pub status: TransactionStatus,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub description: Option<String>,
}

impl NewTransaction {
    pub fn new(user_id: impl Into<String>, kind: TransactionType, amount: Decimal, currency: Currency) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            amount,
            currency,
            tx_hash: None,
            from_address: None,
            to_address: None,
            chain: None,
            status: TransactionStatus::Pending,
            reference_type: None,
            reference_id: None,
            description: None,
        }
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_chain(mut self, chain: Chain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    pub fn with_addresses(mut self, from: Option<String>, to: Option<String>) -> Self {
        self.from_address = from;
        self.to_address = to;
        self
    }

    pub fn with_reference(mut self, reference_type: impl Into<String>, reference_id: impl Into<String>) -> Self {
        self.reference_type = Some(reference_type.into());
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn reference_key(&self) -> Option<ReferenceKey> {
        ReferenceKey::from_parts(
            &self.user_id,
            self.kind,
            self.reference_type.as_deref(),
            self.reference_id.as_deref(),
        )
    }

    pub(crate) fn into_transaction(self, id: Uuid, now: DateTime<Utc>) -> Transaction {
        let completed_at = (self.status == TransactionStatus::Completed).then_some(now);
        Transaction {
            id,
            user_id: self.user_id,
            kind: self.kind,
            amount: self.amount,
            currency: self.currency,
            tx_hash: self.tx_hash,
            from_address: self.from_address,
            to_address: self.to_address,
            chain: self.chain,
            status: self.status,
            failure_reason: None,
            reference_type: self.reference_type,
            reference_id: self.reference_id,
            description: self.description,
            created_at: now,
            completed_at,
        }
    }
}

/// Uniqueness key for rows that must exist at most once, e.g. one prize per tournament.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceKey {
    pub user_id: String,
    pub kind: TransactionType,
    pub reference_type: String,
    pub reference_id: String,
}

impl ReferenceKey {
    fn from_parts(
        user_id: &str,
        kind: TransactionType,
        reference_type: Option<&str>,
        reference_id: Option<&str>,
    ) -> Option<Self> {
        Some(Self {
            user_id: user_id.to_string(),
            kind,
            reference_type: reference_type?.to_string(),
            reference_id: reference_id?.to_string(),
        })
    }
}

/// Partial update applied by a conditional status change.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub status: Option<TransactionStatus>,
    pub tx_hash: Option<String>,
    pub failure_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransactionPatch {
    pub fn status(status: TransactionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn processing() -> Self {
        Self::status(TransactionStatus::Processing)
    }

    pub fn cancelled() -> Self {
        Self::status(TransactionStatus::Cancelled)
    }

    pub fn completed(tx_hash: Option<String>) -> Self {
        Self {
            status: Some(TransactionStatus::Completed),
            tx_hash,
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: Some(TransactionStatus::Failed),
            failure_reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// A user's registered wallet on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub user_id: String,
    pub chain: Chain,
    pub wallet_address: String,
    pub is_primary: bool,
}

/// A user's entry in a tournament, annotated with the prize payout hash once paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentEntry {
    pub tournament_id: String,
    pub user_id: String,
    pub prize_tx_hash: Option<String>,
}
