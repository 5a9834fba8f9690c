//! Wallet transaction processing engine.
//!
//! Verifies on-chain deposits, executes withdrawals, and distributes tournament prizes,
//! coordinating a job queue with an authoritative ledger.
//!
//! ```text
//!   WalletService ──▶ ledger (PENDING row) ──▶ queue (typed job + RetryPolicy)
//!                                                   │
//!                                                   ▼
//!                                      WorkerPool ─▶ WalletProcessor
//!                                                   ├─ DepositVerifier ─▶ ProviderRegistry
//!                                                   ├─ WithdrawalProcessor ─▶ PaymentSigner
//!                                                   └─ PrizePayoutWorker ─▶ PaymentSigner
//!                                                   │
//!                                                   ▼
//!                                   conditional status update on the ledger row
//! ```

pub mod admin;
pub mod chain;
pub mod config;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod payments;
pub mod queue;
pub mod resilience;
pub mod service;
pub mod signer;

pub use config::schema::EngineConfig;
pub use lifecycle::{Engine, Shutdown};
pub use service::WalletService;
