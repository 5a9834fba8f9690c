//! Financial ledger.
//!
//! # Data Flow
//! ```text
//! API boundary (deposit report, withdrawal request)
//!     → store.rs (create row, PENDING)
//!     → workers (conditional status updates)
//!     → balance.rs (pure read over COMPLETED / in-flight rows)
//! ```
//!
//! Rows are never deleted. FAILED, CANCELLED and COMPLETED rows remain as the audit trail.

pub mod asset;
pub mod balance;
pub mod memory;
pub mod store;
pub mod types;

pub use asset::{Chain, Currency};
pub use balance::Balance;
pub use memory::MemoryLedger;
pub use store::{CreateOutcome, LedgerError, LedgerResult, LedgerStore, Page, PageRequest, TransactionFilter};
pub use types::{
    NewTransaction, Transaction, TransactionPatch, TransactionStatus, TransactionType, WalletAccount,
};
