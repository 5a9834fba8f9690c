//! Wallet operations exposed to the API boundary.
//!
//! # Data Flow
//! ```text
//! record_deposit / request_withdrawal / request_prize_payout
//!     → validation.rs (amount, address, currency/chain pairing)
//!     → ledger (PENDING row)
//!     → queue (typed job + retry policy)
//!
//! get_balance / list_transactions → ledger reads only, never the queue
//! ```

pub mod validation;

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::schema::QueuesConfig;
use crate::ledger::asset::{Chain, Currency};
use crate::ledger::balance::{self, Balance};
use crate::ledger::store::{LedgerError, LedgerStore, Page, PageRequest, TransactionFilter};
use crate::ledger::types::{
    NewTransaction, Transaction, TransactionPatch, TransactionStatus, TransactionType, WalletAccount,
};
use crate::queue::job::{Job, PrizePayoutJob, ProcessWithdrawalJob, VerifyDepositJob};
use crate::queue::memory::{JobQueue, QueueError};
use crate::queue::policy::RetryPolicy;

pub const ALREADY_RECORDED: &str = "Transaction already recorded";

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Rejected before any job is enqueued.
    #[error("{0}")]
    Validation(String),

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Decimal, requested: Decimal },

    #[error("Transaction {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Retry policy per job type, taken from the queue configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPolicies {
    pub verify_deposit: RetryPolicy,
    pub process_withdrawal: RetryPolicy,
    pub process_prize_payout: RetryPolicy,
}

impl Default for JobPolicies {
    fn default() -> Self {
        Self::from(&QueuesConfig::default())
    }
}

impl From<&QueuesConfig> for JobPolicies {
    fn from(config: &QueuesConfig) -> Self {
        Self {
            verify_deposit: config.verify_deposit.policy(),
            process_withdrawal: config.process_withdrawal.policy(),
            process_prize_payout: config.process_prize_payout.policy(),
        }
    }
}

/// A chain and the currencies accepted on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportedChain {
    pub chain: Chain,
    pub currencies: Vec<Currency>,
}

/// Entry point for callers. Cheap to clone.
#[derive(Clone)]
pub struct WalletService {
    ledger: Arc<dyn LedgerStore>,
    queue: Arc<dyn JobQueue>,
    policies: JobPolicies,
    /// Serializes balance check and row creation per user.
    withdrawal_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl WalletService {
    pub fn new(ledger: Arc<dyn LedgerStore>, queue: Arc<dyn JobQueue>, policies: JobPolicies) -> Self {
        Self {
            ledger,
            queue,
            policies,
            withdrawal_locks: Arc::new(DashMap::new()),
        }
    }

    /// Record a user-reported deposit and queue its on-chain verification.
    pub async fn record_deposit(
        &self,
        user_id: &str,
        tx_hash: &str,
        amount: Decimal,
        currency: Currency,
        chain: Chain,
    ) -> ServiceResult<Transaction> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::Validation("Deposit amount must be positive".to_string()));
        }
        validation::check_currency(currency, chain).map_err(ServiceError::Validation)?;
        if !validation::is_valid_tx_hash(chain, tx_hash) {
            return Err(ServiceError::Validation(format!("Invalid transaction hash for {}", chain)));
        }
        if self.ledger.find_by_tx_hash(tx_hash).await?.is_some() {
            return Err(ServiceError::Validation(ALREADY_RECORDED.to_string()));
        }

        let new = NewTransaction::new(user_id, TransactionType::Deposit, amount, currency)
            .with_chain(chain)
            .with_tx_hash(tx_hash)
            .with_description(format!("Deposit {} {}", amount, currency));
        let tx = match self.ledger.create_transaction(new).await {
            Ok(tx) => tx,
            Err(LedgerError::DuplicateTxHash(_)) => {
                return Err(ServiceError::Validation(ALREADY_RECORDED.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let job = Job::VerifyDeposit(VerifyDepositJob {
            transaction_id: tx.id,
            tx_hash: tx_hash.to_string(),
            chain,
            expected_amount: amount,
            currency,
        });
        self.queue.enqueue(job, self.policies.verify_deposit).await?;

        tracing::info!(
            transaction_id = %tx.id,
            user_id,
            tx_hash,
            chain = %chain,
            amount = %amount,
            currency = %currency,
            "Deposit recorded"
        );
        Ok(tx)
    }

    /// Create a withdrawal row and queue its submission.
    pub async fn request_withdrawal(
        &self,
        user_id: &str,
        amount: Decimal,
        currency: Currency,
        to_address: &str,
        chain: Chain,
    ) -> ServiceResult<Transaction> {
        if amount < validation::min_withdrawal() {
            return Err(ServiceError::Validation(format!(
                "Minimum withdrawal is {}",
                validation::min_withdrawal()
            )));
        }
        validation::check_currency(currency, chain).map_err(ServiceError::Validation)?;
        if !validation::is_valid_address(chain, to_address) {
            return Err(ServiceError::Validation(format!("Invalid {} address", chain)));
        }

        let lock = self
            .withdrawal_locks
            .entry(user_id.to_string())
            .or_default()
            .clone();
        let result = {
            let _guard = lock.lock().await;
            self.create_withdrawal(user_id, amount, currency, to_address, chain).await
        };
        drop(lock);
        // Only the map's own handle left: nobody is waiting on this user.
        self.withdrawal_locks
            .remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn create_withdrawal(
        &self,
        user_id: &str,
        amount: Decimal,
        currency: Currency,
        to_address: &str,
        chain: Chain,
    ) -> ServiceResult<Transaction> {
        let rows = self.ledger.user_transactions(user_id).await?;
        let available = balance::spendable(&rows, user_id, currency);
        if amount > available {
            return Err(ServiceError::InsufficientBalance {
                available,
                requested: amount,
            });
        }

        let new = NewTransaction::new(user_id, TransactionType::Withdrawal, amount, currency)
            .with_chain(chain)
            .with_addresses(None, Some(to_address.to_string()))
            .with_description(format!("Withdrawal {} {}", amount, currency));
        let tx = self.ledger.create_transaction(new).await?;

        let job = Job::ProcessWithdrawal(ProcessWithdrawalJob {
            transaction_id: tx.id,
            user_id: user_id.to_string(),
            amount,
            currency,
            to_address: to_address.to_string(),
            chain,
        });
        self.queue.enqueue(job, self.policies.process_withdrawal).await?;

        tracing::info!(
            transaction_id = %tx.id,
            user_id,
            chain = %chain,
            amount = %amount,
            currency = %currency,
            "Withdrawal requested"
        );
        Ok(tx)
    }

    /// Queue a tournament prize. The row is created by the payout worker.
    pub async fn request_prize_payout(
        &self,
        user_id: &str,
        tournament_id: &str,
        amount: Decimal,
        currency: Currency,
    ) -> ServiceResult<Uuid> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::Validation("Prize amount must be positive".to_string()));
        }
        if tournament_id.trim().is_empty() {
            return Err(ServiceError::Validation("Tournament id is required".to_string()));
        }

        let job = Job::ProcessPrizePayout(PrizePayoutJob {
            user_id: user_id.to_string(),
            tournament_id: tournament_id.to_string(),
            amount,
            currency,
        });
        let job_id = self.queue.enqueue(job, self.policies.process_prize_payout).await?;
        tracing::info!(job_id = %job_id, user_id, tournament_id, amount = %amount, currency = %currency, "Prize payout queued");
        Ok(job_id)
    }

    /// The currency catalogue, chain by chain.
    pub fn supported_currencies(&self) -> Vec<SupportedChain> {
        Chain::ALL
            .iter()
            .map(|chain| SupportedChain {
                chain: *chain,
                currencies: chain.currencies(),
            })
            .collect()
    }

    pub async fn get_balance(&self, user_id: &str, currency: Currency) -> ServiceResult<Balance> {
        let rows = self.ledger.user_transactions(user_id).await?;
        Ok(balance::calculate(&rows, user_id, currency))
    }

    /// Balances for every currency the user has touched, omitting zero totals.
    pub async fn get_all_balances(&self, user_id: &str) -> ServiceResult<Vec<Balance>> {
        let rows = self.ledger.user_transactions(user_id).await?;
        Ok(Currency::ALL
            .iter()
            .filter(|currency| rows.iter().any(|tx| tx.currency == **currency))
            .map(|currency| balance::calculate(&rows, user_id, *currency))
            .filter(|balance| !balance.total.is_zero())
            .collect())
    }

    pub async fn list_transactions(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        page: &PageRequest,
    ) -> ServiceResult<Page<Transaction>> {
        validation::check_page(page).map_err(ServiceError::Validation)?;
        Ok(self.ledger.list_transactions(user_id, filter, page).await?)
    }

    /// A transaction, visible only to its owner.
    pub async fn get_transaction(&self, user_id: &str, id: Uuid) -> ServiceResult<Transaction> {
        match self.ledger.get_transaction(id).await? {
            Some(tx) if tx.user_id == user_id => Ok(tx),
            _ => Err(ServiceError::NotFound(id)),
        }
    }

    /// Cancel a transaction that no worker has picked up yet.
    pub async fn cancel_transaction(&self, user_id: &str, id: Uuid) -> ServiceResult<Transaction> {
        self.get_transaction(user_id, id).await?;
        let cancelled = self
            .ledger
            .update_transaction_if(id, &[TransactionStatus::Pending], TransactionPatch::cancelled())
            .await?;
        if !cancelled {
            return Err(ServiceError::Validation(
                "Only pending transactions can be cancelled".to_string(),
            ));
        }
        tracing::info!(transaction_id = %id, user_id, "Transaction cancelled");
        self.get_transaction(user_id, id).await
    }

    pub async fn register_wallet(
        &self,
        user_id: &str,
        chain: Chain,
        wallet_address: &str,
        is_primary: bool,
    ) -> ServiceResult<WalletAccount> {
        if !validation::is_valid_address(chain, wallet_address) {
            return Err(ServiceError::Validation(format!("Invalid {} address", chain)));
        }
        let account = WalletAccount {
            user_id: user_id.to_string(),
            chain,
            wallet_address: wallet_address.to_string(),
            is_primary,
        };
        self.ledger.upsert_wallet_account(account.clone()).await?;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::MemoryLedger;
    use crate::queue::job::JobKind;
    use crate::queue::memory::MemoryQueue;
    use std::str::FromStr;

    const ADDRESS: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

    fn hash(n: u8) -> String {
        format!("0x{}", format!("{:02x}", n).repeat(32))
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn service() -> (WalletService, MemoryLedger, MemoryQueue) {
        let ledger = MemoryLedger::default();
        let queue = MemoryQueue::default();
        let service = WalletService::new(Arc::new(ledger.clone()), Arc::new(queue.clone()), JobPolicies::default());
        (service, ledger, queue)
    }

    async fn credit(ledger: &MemoryLedger, user: &str, amount: &str, currency: Currency) {
        let tx = ledger
            .create_transaction(
                NewTransaction::new(user, TransactionType::Deposit, dec(amount), currency)
                    .with_status(TransactionStatus::Processing),
            )
            .await
            .unwrap();
        ledger
            .update_transaction_if(tx.id, &[TransactionStatus::Processing], TransactionPatch::completed(None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deposit_enqueues_verification() {
        let (service, _, queue) = service();
        let tx = service
            .record_deposit("u1", &hash(1), dec("100"), Currency::UsdtEth, Chain::Ethereum)
            .await
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.description.as_deref(), Some("Deposit 100 USDT_ETH"));
        let envelope = queue.try_dequeue(JobKind::VerifyDeposit).unwrap();
        assert_eq!(envelope.policy, RetryPolicy::deposit_verification());
        assert_eq!(envelope.job.transaction_id(), Some(tx.id));
    }

    #[tokio::test]
    async fn test_duplicate_deposit_rejected() {
        let (service, _, _) = service();
        service
            .record_deposit("u1", &hash(0xab), dec("100"), Currency::UsdtEth, Chain::Ethereum)
            .await
            .unwrap();
        // Hash lookups ignore hex case.
        let shouted = format!("0x{}", "AB".repeat(32));
        let err = service
            .record_deposit("u2", &shouted, dec("5"), Currency::UsdtEth, Chain::Ethereum)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), ALREADY_RECORDED);
    }

    #[tokio::test]
    async fn test_deposit_validation() {
        let (service, ledger, _) = service();
        assert!(matches!(
            service.record_deposit("u1", &hash(2), Decimal::ZERO, Currency::Eth, Chain::Ethereum).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.record_deposit("u1", &hash(2), Decimal::ONE, Currency::UsdtTron, Chain::Ethereum).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_withdrawal_checks_available_balance() {
        let (service, ledger, queue) = service();
        credit(&ledger, "u1", "100", Currency::UsdcEth).await;

        let tx = service
            .request_withdrawal("u1", dec("60"), Currency::UsdcEth, ADDRESS, Chain::Ethereum)
            .await
            .unwrap();
        assert_eq!(tx.to_address.as_deref(), Some(ADDRESS));
        assert_eq!(queue.depth(JobKind::ProcessWithdrawal), 1);

        // The in-flight 60 is already spoken for.
        let err = service
            .request_withdrawal("u1", dec("50"), Currency::UsdcEth, ADDRESS, Chain::Ethereum)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn test_withdrawal_locks_are_released() {
        let (service, ledger, _) = service();
        credit(&ledger, "u1", "10", Currency::Eth).await;

        service
            .request_withdrawal("u1", dec("4"), Currency::Eth, ADDRESS, Chain::Ethereum)
            .await
            .unwrap();
        assert!(service
            .request_withdrawal("u1", dec("400"), Currency::Eth, ADDRESS, Chain::Ethereum)
            .await
            .is_err());
        assert!(service.withdrawal_locks.is_empty());
    }

    #[tokio::test]
    async fn test_withdrawal_validation() {
        let (service, ledger, _) = service();
        credit(&ledger, "u1", "100", Currency::Eth).await;

        for (amount, address) in [("0.0001", ADDRESS), ("1", "0xdeadbeef")] {
            let result = service
                .request_withdrawal("u1", dec(amount), Currency::Eth, address, Chain::Ethereum)
                .await;
            assert!(matches!(result, Err(ServiceError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_supported_currencies() {
        let (service, _, _) = service();
        let catalogue = service.supported_currencies();

        assert_eq!(catalogue.len(), Chain::ALL.len());
        let ethereum = catalogue.iter().find(|c| c.chain == Chain::Ethereum).unwrap();
        assert_eq!(ethereum.currencies, vec![Currency::Eth, Currency::UsdtEth, Currency::UsdcEth]);
        for entry in &catalogue {
            assert!(!entry.currencies.is_empty());
            for currency in &entry.currencies {
                assert!(validation::check_currency(*currency, entry.chain).is_ok());
            }
        }

        let json = serde_json::to_value(&catalogue).unwrap();
        assert_eq!(json[0]["chain"], "ethereum");
        assert_eq!(json[0]["currencies"][1], "USDT_ETH");
    }

    #[tokio::test]
    async fn test_balances() {
        let (service, ledger, _) = service();
        credit(&ledger, "u1", "100", Currency::UsdtEth).await;
        credit(&ledger, "u1", "2.5", Currency::Eth).await;

        let balance = service.get_balance("u1", Currency::UsdtEth).await.unwrap();
        assert_eq!(balance.total, dec("100"));
        assert_eq!(service.get_balance("u1", Currency::Sol).await.unwrap(), Balance::zero(Currency::Sol));

        let all = service.get_all_balances("u1").await.unwrap();
        let currencies: Vec<Currency> = all.iter().map(|b| b.currency).collect();
        assert_eq!(currencies, vec![Currency::Eth, Currency::UsdtEth]);
    }

    #[tokio::test]
    async fn test_get_and_cancel_are_owner_scoped() {
        let (service, _, _) = service();
        let tx = service
            .record_deposit("u1", &hash(3), dec("10"), Currency::Eth, Chain::Ethereum)
            .await
            .unwrap();

        assert!(matches!(service.get_transaction("u2", tx.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.cancel_transaction("u2", tx.id).await, Err(ServiceError::NotFound(_))));

        let cancelled = service.cancel_transaction("u1", tx.id).await.unwrap();
        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
        assert!(matches!(
            service.cancel_transaction("u1", tx.id).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_rejects_bad_paging() {
        let (service, _, _) = service();
        let result = service
            .list_transactions("u1", &TransactionFilter::default(), &PageRequest::new(1, 500))
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_prize_request_enqueues() {
        let (service, _, queue) = service();
        service
            .request_prize_payout("u1", "t1", dec("45"), Currency::UsdtEth)
            .await
            .unwrap();
        assert_eq!(queue.depth(JobKind::ProcessPrizePayout), 1);
    }
}
