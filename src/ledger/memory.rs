//! In-process ledger store with JSON snapshot persistence.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::ledger::asset::Chain;
use crate::ledger::store::{
    CreateOutcome, LedgerError, LedgerResult, LedgerStore, Page, PageRequest, SortField, SortOrder,
    TransactionFilter,
};
use crate::ledger::types::{
    NewTransaction, ReferenceKey, TournamentEntry, Transaction, TransactionPatch, TransactionStatus,
    TransactionType, WalletAccount,
};
use crate::observability::metrics;

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    transactions: Vec<Transaction>,
    wallets: Vec<WalletAccount>,
    entries: Vec<TournamentEntry>,
}

/// A thread-safe ledger kept in concurrent maps.
///
/// Conditional updates run under the row's shard lock, so a status check and the
/// write that follows it cannot interleave with another writer.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    transactions: Arc<DashMap<Uuid, Transaction>>,
    by_hash: Arc<DashMap<String, Uuid>>,
    by_reference: Arc<DashMap<ReferenceKey, Uuid>>,
    wallets: Arc<DashMap<(String, Chain), Vec<WalletAccount>>>,
    entries: Arc<DashMap<(String, String), TournamentEntry>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self {
            snapshot_path,
            ..Self::default()
        }
    }

    /// Load from a snapshot file if it exists; otherwise start empty.
    pub fn load_from_file(path: &Path) -> LedgerResult<Self> {
        let ledger = Self::new(Some(path.to_path_buf()));
        if !path.exists() {
            return Ok(ledger);
        }

        let file = File::open(path).map_err(|e| LedgerError::Persistence(e.to_string()))?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;

        for tx in snapshot.transactions {
            ledger.index(&tx);
            ledger.transactions.insert(tx.id, tx);
        }
        for account in snapshot.wallets {
            ledger
                .wallets
                .entry((account.user_id.clone(), account.chain))
                .or_default()
                .push(account);
        }
        for entry in snapshot.entries {
            ledger
                .entries
                .insert((entry.tournament_id.clone(), entry.user_id.clone()), entry);
        }

        tracing::info!(
            path = %path.display(),
            transactions = ledger.transactions.len(),
            "Loaded ledger snapshot"
        );
        Ok(ledger)
    }

    /// Write the snapshot file, if a path is configured.
    pub fn save_to_file(&self) -> LedgerResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = Snapshot {
            transactions: self.transactions.iter().map(|r| r.value().clone()).collect(),
            wallets: self.wallets.iter().flat_map(|r| r.value().clone()).collect(),
            entries: self.entries.iter().map(|r| r.value().clone()).collect(),
        };

        let file = File::create(path).map_err(|e| LedgerError::Persistence(e.to_string()))?;
        serde_json::to_writer(BufWriter::new(file), &snapshot)
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;

        tracing::info!(
            path = %path.display(),
            transactions = snapshot.transactions.len(),
            "Saved ledger snapshot"
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    fn index(&self, tx: &Transaction) {
        if let Some(hash) = &tx.tx_hash {
            self.by_hash.insert(hash.to_lowercase(), tx.id);
        }
        if let Some(key) = tx.reference_key() {
            self.by_reference.insert(key, tx.id);
        }
    }

    fn insert_new(&self, new: NewTransaction) -> LedgerResult<Transaction> {
        let tx = new.into_transaction(Uuid::new_v4(), Utc::now());

        if let Some(hash) = &tx.tx_hash {
            match self.by_hash.entry(hash.to_lowercase()) {
                Entry::Occupied(_) => return Err(LedgerError::DuplicateTxHash(hash.clone())),
                Entry::Vacant(slot) => {
                    slot.insert(tx.id);
                }
            }
        }

        self.transactions.insert(tx.id, tx.clone());
        metrics::record_transaction(tx.kind, tx.status);
        Ok(tx)
    }
}

fn sort_transactions(items: &mut [Transaction], request: &PageRequest) {
    items.sort_by(|a, b| {
        let ordering = match request.sort_by {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Amount => a.amount.cmp(&b.amount),
        };
        match request.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn create_transaction(&self, new: NewTransaction) -> LedgerResult<Transaction> {
        let key = new.reference_key();
        let tx = self.insert_new(new)?;
        if let Some(key) = key {
            self.by_reference.insert(key, tx.id);
        }
        Ok(tx)
    }

    async fn create_transaction_unique(&self, new: NewTransaction) -> LedgerResult<CreateOutcome> {
        let Some(key) = new.reference_key() else {
            return self.insert_new(new).map(CreateOutcome::Created);
        };

        let existing_id = match self.by_reference.entry(key) {
            Entry::Occupied(slot) => *slot.get(),
            Entry::Vacant(slot) => {
                let tx = self.insert_new(new)?;
                slot.insert(tx.id);
                return Ok(CreateOutcome::Created(tx));
            }
        };

        let existing = self
            .transactions
            .get(&existing_id)
            .map(|r| r.value().clone())
            .ok_or(LedgerError::NotFound(existing_id))?;
        Ok(CreateOutcome::Existing(existing))
    }

    async fn get_transaction(&self, id: Uuid) -> LedgerResult<Option<Transaction>> {
        Ok(self.transactions.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_tx_hash(&self, tx_hash: &str) -> LedgerResult<Option<Transaction>> {
        let Some(id) = self.by_hash.get(&tx_hash.to_lowercase()).map(|r| *r.value()) else {
            return Ok(None);
        };
        Ok(self.transactions.get(&id).map(|r| r.value().clone()))
    }

    async fn update_transaction_if(
        &self,
        id: Uuid,
        expected: &[TransactionStatus],
        patch: TransactionPatch,
    ) -> LedgerResult<bool> {
        let mut row = self.transactions.get_mut(&id).ok_or(LedgerError::NotFound(id))?;

        if !expected.contains(&row.status) {
            return Ok(false);
        }
        if row.status.is_terminal() {
            return Err(LedgerError::Terminal(id));
        }
        if let Some(next) = patch.status {
            if next != row.status && !row.status.can_transition_to(next) {
                return Err(LedgerError::InvalidTransition {
                    id,
                    from: row.status,
                    to: next,
                });
            }
        }

        if let Some(hash) = patch.tx_hash {
            self.by_hash.insert(hash.to_lowercase(), id);
            row.tx_hash = Some(hash);
        }
        if let Some(status) = patch.status {
            row.status = status;
            metrics::record_transaction(row.kind, status);
        }
        if let Some(reason) = patch.failure_reason {
            if row.status == TransactionStatus::Failed {
                row.failure_reason = Some(reason);
            }
        }
        if row.status == TransactionStatus::Completed && row.completed_at.is_none() {
            row.completed_at = Some(patch.completed_at.unwrap_or_else(Utc::now));
        }

        Ok(true)
    }

    async fn list_transactions(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        page: &PageRequest,
    ) -> LedgerResult<Page<Transaction>> {
        let mut items: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|r| r.value().user_id == user_id && filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();

        let total = items.len();
        sort_transactions(&mut items, page);
        let items = items
            .into_iter()
            .skip(page.offset())
            .take(page.limit as usize)
            .collect();

        Ok(Page::new(items, page, total))
    }

    async fn user_transactions(&self, user_id: &str) -> LedgerResult<Vec<Transaction>> {
        Ok(self
            .transactions
            .iter()
            .filter(|r| r.value().user_id == user_id)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn transactions_with(
        &self,
        kinds: &[TransactionType],
        statuses: &[TransactionStatus],
    ) -> LedgerResult<Vec<Transaction>> {
        let mut items: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|r| kinds.contains(&r.value().kind) && statuses.contains(&r.value().status))
            .map(|r| r.value().clone())
            .collect();
        items.sort_by_key(|tx| tx.created_at);
        Ok(items)
    }

    async fn find_wallet_account(&self, user_id: &str, chain: Chain) -> LedgerResult<Option<WalletAccount>> {
        Ok(self
            .wallets
            .get(&(user_id.to_string(), chain))
            .and_then(|r| r.value().iter().find(|w| w.is_primary).cloned()))
    }

    async fn upsert_wallet_account(&self, account: WalletAccount) -> LedgerResult<()> {
        let mut accounts = self
            .wallets
            .entry((account.user_id.clone(), account.chain))
            .or_default();

        if account.is_primary {
            for existing in accounts.iter_mut() {
                existing.is_primary = false;
            }
        }
        match accounts
            .iter_mut()
            .find(|w| w.wallet_address.eq_ignore_ascii_case(&account.wallet_address))
        {
            Some(existing) => existing.is_primary = account.is_primary,
            None => accounts.push(account),
        }
        Ok(())
    }

    async fn register_entry(&self, tournament_id: &str, user_id: &str) -> LedgerResult<()> {
        self.entries
            .entry((tournament_id.to_string(), user_id.to_string()))
            .or_insert_with(|| TournamentEntry {
                tournament_id: tournament_id.to_string(),
                user_id: user_id.to_string(),
                prize_tx_hash: None,
            });
        Ok(())
    }

    async fn update_entry_annotation(&self, tournament_id: &str, user_id: &str, tx_hash: &str) -> LedgerResult<bool> {
        match self.entries.get_mut(&(tournament_id.to_string(), user_id.to_string())) {
            Some(mut entry) => {
                entry.prize_tx_hash = Some(tx_hash.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn entry_annotation(&self, tournament_id: &str, user_id: &str) -> LedgerResult<Option<String>> {
        Ok(self
            .entries
            .get(&(tournament_id.to_string(), user_id.to_string()))
            .and_then(|r| r.value().prize_tx_hash.clone()))
    }
}
