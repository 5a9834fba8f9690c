//! Outbound withdrawals.
//!
//! A withdrawal is submitted at most once. Any submission error fails the row for
//! manual review because the transfer may already be on the wire.

use std::sync::Arc;
use std::time::Duration;

use crate::ledger::store::LedgerStore;
use crate::ledger::types::{TransactionPatch, TransactionStatus};
use crate::payments::{claim, record_broadcast, within};
use crate::queue::error::JobError;
use crate::queue::job::ProcessWithdrawalJob;
use crate::signer::{PaymentRequest, PaymentSigner};

pub const NOT_CONFIGURED_REASON: &str = "Platform wallet not configured";

pub struct WithdrawalProcessor {
    ledger: Arc<dyn LedgerStore>,
    signer: Option<Arc<dyn PaymentSigner>>,
    store_timeout: Duration,
}

impl WithdrawalProcessor {
    pub fn new(ledger: Arc<dyn LedgerStore>, signer: Option<Arc<dyn PaymentSigner>>, store_timeout: Duration) -> Self {
        Self {
            ledger,
            signer,
            store_timeout,
        }
    }

    pub async fn process(&self, job: &ProcessWithdrawalJob, attempt: u32) -> Result<(), JobError> {
        tracing::debug!(
            transaction_id = %job.transaction_id,
            chain = %job.chain,
            attempt,
            "Processing withdrawal"
        );

        // A redelivery that finds the row PROCESSING must not submit again.
        if !claim(self.ledger.as_ref(), self.store_timeout, job.transaction_id, false).await? {
            return Ok(());
        }

        let Some(signer) = &self.signer else {
            self.settle(job, TransactionPatch::failed(NOT_CONFIGURED_REASON)).await?;
            tracing::error!(transaction_id = %job.transaction_id, "Withdrawal failed: {}", NOT_CONFIGURED_REASON);
            return Err(JobError::Configuration(NOT_CONFIGURED_REASON.to_string()));
        };

        let request = PaymentRequest {
            to_address: job.to_address.clone(),
            amount: job.amount,
            currency: job.currency,
            chain: job.chain,
        };

        match signer.submit(&request).await {
            Ok(tx_hash) => {
                record_broadcast(self.ledger.as_ref(), self.store_timeout, job.transaction_id, &tx_hash).await?;
                tracing::info!(
                    transaction_id = %job.transaction_id,
                    tx_hash = %tx_hash,
                    chain = %job.chain,
                    amount = %job.amount,
                    currency = %job.currency,
                    "Withdrawal completed"
                );
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                // The submission error is final even when this write fails; the row then
                // stays PROCESSING and shows up as stale on the review list.
                if let Err(write) = self.settle(job, TransactionPatch::failed(reason.clone())).await {
                    tracing::error!(transaction_id = %job.transaction_id, error = %write, "Could not record failed withdrawal");
                }
                tracing::error!(
                    transaction_id = %job.transaction_id,
                    chain = %job.chain,
                    error = %reason,
                    "Withdrawal submission failed, flagged for review"
                );
                Err(JobError::Submission(reason))
            }
        }
    }

    /// The attempt budget ran out on a retryable error (a ledger timeout).
    pub async fn give_up(&self, job: &ProcessWithdrawalJob, last_error: &JobError) {
        let result = async {
            let row = within(self.store_timeout, "load transaction", self.ledger.get_transaction(job.transaction_id)).await?;
            match row.map(|tx| tx.status) {
                Some(TransactionStatus::Pending) => {
                    claim(self.ledger.as_ref(), self.store_timeout, job.transaction_id, false).await?;
                    self.settle(job, TransactionPatch::failed(last_error.to_string())).await
                }
                Some(TransactionStatus::Processing) => {
                    tracing::error!(
                        transaction_id = %job.transaction_id,
                        error = %last_error,
                        "Withdrawal outcome unknown, left PROCESSING for the review list"
                    );
                    Ok(())
                }
                _ => Ok(()),
            }
        }
        .await;
        if let Err(e) = result {
            tracing::error!(transaction_id = %job.transaction_id, error = %e, "Could not settle exhausted withdrawal");
        }
    }

    async fn settle(&self, job: &ProcessWithdrawalJob, patch: TransactionPatch) -> Result<(), JobError> {
        within(
            self.store_timeout,
            "settle withdrawal",
            self.ledger
                .update_transaction_if(job.transaction_id, &[TransactionStatus::Processing], patch),
        )
        .await?;
        Ok(())
    }
}
