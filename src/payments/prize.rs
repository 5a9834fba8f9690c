//! Tournament prize payouts.
//!
//! The payout row is keyed on (user, PRIZE_WIN, "tournament", tournament id) and created
//! atomically, so a redelivered job finds the existing row instead of paying twice.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::ledger::store::{CreateOutcome, LedgerResult, LedgerStore};
use crate::ledger::types::{NewTransaction, TransactionPatch, TransactionStatus, TransactionType};
use crate::payments::{record_broadcast, within};
use crate::queue::error::JobError;
use crate::queue::job::PrizePayoutJob;
use crate::resilience::timeouts::with_deadline;
use crate::signer::{PaymentRequest, PaymentSigner};

pub const TOURNAMENT_REFERENCE: &str = "tournament";

/// Outcome of one annotation read-repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub checked: usize,
    pub repaired: usize,
    /// Completed payouts whose tournament entry does not exist.
    pub missing_entries: usize,
}

pub struct PrizePayoutWorker {
    ledger: Arc<dyn LedgerStore>,
    signer: Option<Arc<dyn PaymentSigner>>,
    store_timeout: Duration,
}

impl PrizePayoutWorker {
    pub fn new(ledger: Arc<dyn LedgerStore>, signer: Option<Arc<dyn PaymentSigner>>, store_timeout: Duration) -> Self {
        Self {
            ledger,
            signer,
            store_timeout,
        }
    }

    pub async fn pay(&self, job: &PrizePayoutJob, attempt: u32) -> Result<(), JobError> {
        let chain = job.currency.home_chain();
        tracing::debug!(
            user_id = %job.user_id,
            tournament_id = %job.tournament_id,
            chain = %chain,
            attempt,
            "Processing prize payout"
        );

        let wallet = within(
            self.store_timeout,
            "find wallet account",
            self.ledger.find_wallet_account(&job.user_id, chain),
        )
        .await?
        .ok_or_else(|| JobError::MissingWallet {
            user_id: job.user_id.clone(),
            chain,
        })?;

        let Some(signer) = &self.signer else {
            return Err(JobError::Configuration("Platform wallet not configured".to_string()));
        };

        let new = NewTransaction::new(job.user_id.clone(), TransactionType::PrizeWin, job.amount, job.currency)
            .with_status(TransactionStatus::Processing)
            .with_chain(chain)
            .with_addresses(None, Some(wallet.wallet_address.clone()))
            .with_reference(TOURNAMENT_REFERENCE, job.tournament_id.clone())
            .with_description(format!("Prize for tournament {}", job.tournament_id));

        let tx = match within(self.store_timeout, "create payout", self.ledger.create_transaction_unique(new)).await? {
            CreateOutcome::Created(tx) => tx,
            CreateOutcome::Existing(existing) => {
                match existing.status {
                    TransactionStatus::Completed => tracing::info!(
                        transaction_id = %existing.id,
                        tournament_id = %job.tournament_id,
                        "Prize already paid"
                    ),
                    TransactionStatus::Pending | TransactionStatus::Processing => {
                        return Err(JobError::Unresolved {
                            transaction_id: existing.id,
                            detail: format!("prize for tournament {} already in flight", job.tournament_id),
                        })
                    }
                    TransactionStatus::Failed | TransactionStatus::Cancelled => tracing::warn!(
                        transaction_id = %existing.id,
                        tournament_id = %job.tournament_id,
                        status = %existing.status,
                        "Prize payout previously failed, awaiting manual review"
                    ),
                }
                return Ok(());
            }
        };

        let request = PaymentRequest {
            to_address: wallet.wallet_address,
            amount: job.amount,
            currency: job.currency,
            chain,
        };
        let tx_hash = match signer.submit(&request).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                let reason = e.to_string();
                let write = self.ledger.update_transaction_if(
                    tx.id,
                    &[TransactionStatus::Processing],
                    TransactionPatch::failed(reason.clone()),
                );
                if let Err(write) = within(self.store_timeout, "fail payout", write).await {
                    tracing::error!(transaction_id = %tx.id, error = %write, "Could not record failed payout");
                }
                tracing::error!(transaction_id = %tx.id, error = %reason, "Prize submission failed, flagged for review");
                return Err(JobError::Submission(reason));
            }
        };

        record_broadcast(self.ledger.as_ref(), self.store_timeout, tx.id, &tx_hash).await?;
        tracing::info!(
            transaction_id = %tx.id,
            tx_hash = %tx_hash,
            chain = %chain,
            tournament_id = %job.tournament_id,
            amount = %job.amount,
            currency = %job.currency,
            "Prize paid"
        );

        self.annotate(job, &tx_hash).await;
        Ok(())
    }

    /// Best-effort entry annotation. Failures are left to [`reconcile_annotations`].
    async fn annotate(&self, job: &PrizePayoutJob, tx_hash: &str) {
        let write = self
            .ledger
            .update_entry_annotation(&job.tournament_id, &job.user_id, tx_hash);
        match with_deadline("annotate entry", self.store_timeout, write).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => tracing::warn!(
                tournament_id = %job.tournament_id,
                user_id = %job.user_id,
                "No tournament entry to annotate"
            ),
            Ok(Err(e)) => tracing::warn!(tournament_id = %job.tournament_id, error = %e, "Entry annotation deferred"),
            Err(e) => tracing::warn!(tournament_id = %job.tournament_id, error = %e, "Entry annotation deferred"),
        }
    }

    pub fn give_up(&self, job: &PrizePayoutJob, last_error: &JobError) {
        tracing::error!(
            user_id = %job.user_id,
            tournament_id = %job.tournament_id,
            amount = %job.amount,
            currency = %job.currency,
            error = %last_error,
            "Prize payout unresolved, operator action required"
        );
    }
}

/// Copy payout hashes onto tournament entries that are missing them.
pub async fn reconcile_annotations(ledger: &dyn LedgerStore) -> LedgerResult<ReconcileReport> {
    let payouts = ledger
        .transactions_with(&[TransactionType::PrizeWin], &[TransactionStatus::Completed])
        .await?;

    let mut report = ReconcileReport::default();
    for tx in payouts {
        let (Some(TOURNAMENT_REFERENCE), Some(tournament_id), Some(tx_hash)) =
            (tx.reference_type.as_deref(), tx.reference_id.as_deref(), tx.tx_hash.as_deref())
        else {
            continue;
        };
        report.checked += 1;

        if ledger.entry_annotation(tournament_id, &tx.user_id).await?.as_deref() == Some(tx_hash) {
            continue;
        }
        if ledger.update_entry_annotation(tournament_id, &tx.user_id, tx_hash).await? {
            report.repaired += 1;
        } else {
            report.missing_entries += 1;
        }
    }

    if report.repaired > 0 || report.missing_entries > 0 {
        tracing::info!(
            checked = report.checked,
            repaired = report.repaired,
            missing_entries = report.missing_entries,
            "Annotation reconciliation finished"
        );
    }
    Ok(report)
}
