//! Shared fixtures for the worker and API tests.
#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;
use wallet_engine::chain::{ChainError, ChainResult, ProviderRegistry, ReceiptOutcome, ReceiptSource};
use wallet_engine::ledger::{
    Chain, CreateOutcome, Currency, LedgerError, LedgerResult, MemoryLedger, NewTransaction, Page, PageRequest,
    Transaction, TransactionFilter, TransactionPatch, TransactionStatus, TransactionType, WalletAccount,
};
use wallet_engine::ledger::store::LedgerStore;
use wallet_engine::payments::WalletProcessor;
use wallet_engine::queue::{dispatch, Disposition, JobKind, JobQueue, MemoryQueue};
use wallet_engine::service::{JobPolicies, WalletService};
use wallet_engine::signer::{PaymentRequest, PaymentSigner, SignerError, SignerResult};

pub const STORE_TIMEOUT: Duration = Duration::from_secs(2);
pub const USER_WALLET: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn tx_hash(n: u8) -> String {
    format!("0x{}", format!("{:02x}", n).repeat(32))
}

/// Receipt source that replays a script per hash. The last outcome repeats.
#[derive(Default)]
pub struct ScriptedReceipts {
    scripts: Mutex<HashMap<String, VecDeque<ReceiptOutcome>>>,
    pub lookups: AtomicU32,
}

impl ScriptedReceipts {
    pub fn script(&self, tx_hash: &str, outcomes: &[ReceiptOutcome]) {
        self.scripts
            .lock()
            .unwrap()
            .insert(tx_hash.to_lowercase(), outcomes.iter().copied().collect());
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReceiptSource for ScriptedReceipts {
    async fn receipt(&self, tx_hash: &str) -> ChainResult<ReceiptOutcome> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if tx_hash.len() != 66 || !tx_hash.starts_with("0x") {
            return Err(ChainError::InvalidTxHash(tx_hash.to_string()));
        }
        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.get_mut(&tx_hash.to_lowercase()) else {
            return Ok(ReceiptOutcome::NotFoundYet);
        };
        let outcome = if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().copied().unwrap_or(ReceiptOutcome::NotFoundYet)
        };
        Ok(outcome)
    }
}

/// Signer that records every request and returns sequential hashes.
#[derive(Default)]
pub struct RecordingSigner {
    pub requests: Mutex<Vec<PaymentRequest>>,
    pub fail_with: Mutex<Option<String>>,
}

impl RecordingSigner {
    pub fn failing(message: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_with: Mutex::new(Some(message.to_string())),
        }
    }

    pub fn submissions(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentSigner for RecordingSigner {
    async fn submit(&self, request: &PaymentRequest) -> SignerResult<String> {
        tokio::task::yield_now().await;
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(SignerError::Rpc(message));
        }
        Ok(tx_hash(0xa0 + requests.len() as u8))
    }
}

/// Ledger that times out the next `n` COMPLETED writes, as a stalled store would.
pub struct FaultyLedger {
    inner: MemoryLedger,
    completion_failures: AtomicU32,
}

impl FaultyLedger {
    pub fn new(inner: MemoryLedger) -> Self {
        Self {
            inner,
            completion_failures: AtomicU32::new(0),
        }
    }

    pub fn fail_completions(&self, n: u32) {
        self.completion_failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for FaultyLedger {
    async fn create_transaction(&self, new: NewTransaction) -> LedgerResult<Transaction> {
        self.inner.create_transaction(new).await
    }

    async fn create_transaction_unique(&self, new: NewTransaction) -> LedgerResult<CreateOutcome> {
        self.inner.create_transaction_unique(new).await
    }

    async fn get_transaction(&self, id: Uuid) -> LedgerResult<Option<Transaction>> {
        self.inner.get_transaction(id).await
    }

    async fn find_by_tx_hash(&self, tx_hash: &str) -> LedgerResult<Option<Transaction>> {
        self.inner.find_by_tx_hash(tx_hash).await
    }

    async fn update_transaction_if(
        &self,
        id: Uuid,
        expected: &[TransactionStatus],
        patch: TransactionPatch,
    ) -> LedgerResult<bool> {
        let failing = patch.status == Some(TransactionStatus::Completed)
            && self
                .completion_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if failing {
            return Err(LedgerError::Timeout(5));
        }
        self.inner.update_transaction_if(id, expected, patch).await
    }

    async fn list_transactions(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        page: &PageRequest,
    ) -> LedgerResult<Page<Transaction>> {
        self.inner.list_transactions(user_id, filter, page).await
    }

    async fn user_transactions(&self, user_id: &str) -> LedgerResult<Vec<Transaction>> {
        self.inner.user_transactions(user_id).await
    }

    async fn transactions_with(
        &self,
        kinds: &[TransactionType],
        statuses: &[TransactionStatus],
    ) -> LedgerResult<Vec<Transaction>> {
        self.inner.transactions_with(kinds, statuses).await
    }

    async fn find_wallet_account(&self, user_id: &str, chain: Chain) -> LedgerResult<Option<WalletAccount>> {
        self.inner.find_wallet_account(user_id, chain).await
    }

    async fn upsert_wallet_account(&self, account: WalletAccount) -> LedgerResult<()> {
        self.inner.upsert_wallet_account(account).await
    }

    async fn register_entry(&self, tournament_id: &str, user_id: &str) -> LedgerResult<()> {
        self.inner.register_entry(tournament_id, user_id).await
    }

    async fn update_entry_annotation(&self, tournament_id: &str, user_id: &str, tx_hash: &str) -> LedgerResult<bool> {
        self.inner.update_entry_annotation(tournament_id, user_id, tx_hash).await
    }

    async fn entry_annotation(&self, tournament_id: &str, user_id: &str) -> LedgerResult<Option<String>> {
        self.inner.entry_annotation(tournament_id, user_id).await
    }
}

/// Ledger, queue and processor wired together the way the engine wires them.
///
/// The processor writes through `faults`, the service and assertions use `ledger`
/// directly; both see the same rows.
pub struct Harness {
    pub ledger: MemoryLedger,
    pub faults: Arc<FaultyLedger>,
    pub queue: MemoryQueue,
    pub receipts: Arc<ScriptedReceipts>,
    pub signer: Option<Arc<RecordingSigner>>,
    pub processor: WalletProcessor,
}

impl Harness {
    pub fn new(signer: Option<Arc<RecordingSigner>>) -> Self {
        let ledger = MemoryLedger::default();
        let queue = MemoryQueue::default();
        let receipts = Arc::new(ScriptedReceipts::default());
        let providers = ProviderRegistry::new().with_provider(Chain::Ethereum, receipts.clone());
        let faults = Arc::new(FaultyLedger::new(ledger.clone()));
        let processor = WalletProcessor::new(
            faults.clone(),
            providers,
            signer.clone().map(|s| s as Arc<dyn PaymentSigner>),
            STORE_TIMEOUT,
        );
        Self {
            ledger,
            faults,
            queue,
            receipts,
            signer,
            processor,
        }
    }

    pub fn with_signer() -> Self {
        Self::new(Some(Arc::new(RecordingSigner::default())))
    }

    pub fn without_signer() -> Self {
        Self::new(None)
    }

    /// Service over the same ledger and queue, with the default retry policies.
    pub fn service(&self) -> WalletService {
        WalletService::new(Arc::new(self.ledger.clone()), Arc::new(self.queue.clone()), JobPolicies::default())
    }

    /// Deliver one job of `kind`. Retries go straight back on the queue.
    pub async fn step(&self, kind: JobKind) -> Option<Disposition> {
        let mut envelope = self.queue.try_dequeue(kind)?;
        let disposition = dispatch(&self.processor, &mut envelope).await;
        if let Disposition::Retry(_) = disposition {
            self.queue.retry_later(envelope, Duration::ZERO).await.unwrap();
        }
        Some(disposition)
    }

    /// Deliver until the queue for `kind` is empty.
    pub async fn drain(&self, kind: JobKind) -> Vec<Disposition> {
        let mut outcomes = Vec::new();
        while let Some(disposition) = self.step(kind).await {
            outcomes.push(disposition);
        }
        outcomes
    }

    pub async fn register_primary_wallet(&self, user_id: &str, chain: Chain) {
        self.ledger
            .upsert_wallet_account(wallet_engine::ledger::WalletAccount {
                user_id: user_id.to_string(),
                chain,
                wallet_address: USER_WALLET.to_string(),
                is_primary: true,
            })
            .await
            .unwrap();
    }

    /// A settled deposit, for seeding balances.
    pub async fn completed_deposit(&self, user_id: &str, amount: &str, currency: Currency) {
        let tx = self
            .ledger
            .create_transaction(
                NewTransaction::new(user_id, TransactionType::Deposit, dec(amount), currency)
                    .with_status(TransactionStatus::Processing),
            )
            .await
            .unwrap();
        self.ledger
            .update_transaction_if(tx.id, &[TransactionStatus::Processing], TransactionPatch::completed(None))
            .await
            .unwrap();
    }
}
