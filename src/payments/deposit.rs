//! On-chain deposit verification.

use std::sync::Arc;
use std::time::Duration;

use crate::chain::registry::ProviderRegistry;
use crate::chain::types::ReceiptOutcome;
use crate::ledger::store::LedgerStore;
use crate::ledger::types::{TransactionPatch, TransactionStatus};
use crate::payments::{claim, within};
use crate::queue::error::JobError;
use crate::queue::job::VerifyDepositJob;

pub const REVERTED_REASON: &str = "Transaction reverted on-chain";
pub const TIMED_OUT_REASON: &str = "Verification timed out";

/// Confirms reported deposits against chain receipts.
pub struct DepositVerifier {
    ledger: Arc<dyn LedgerStore>,
    providers: ProviderRegistry,
    store_timeout: Duration,
}

impl DepositVerifier {
    pub fn new(ledger: Arc<dyn LedgerStore>, providers: ProviderRegistry, store_timeout: Duration) -> Self {
        Self {
            ledger,
            providers,
            store_timeout,
        }
    }

    pub async fn verify(&self, job: &VerifyDepositJob, attempt: u32) -> Result<(), JobError> {
        tracing::debug!(
            transaction_id = %job.transaction_id,
            tx_hash = %job.tx_hash,
            chain = %job.chain,
            attempt,
            "Verifying deposit"
        );

        if !claim(self.ledger.as_ref(), self.store_timeout, job.transaction_id, true).await? {
            return Ok(());
        }

        let Some(provider) = self.providers.get(job.chain) else {
            let reason = format!("No provider for chain {}", job.chain);
            self.fail(job, &reason).await?;
            return Err(JobError::Configuration(reason));
        };

        let outcome = match provider.receipt(&job.tx_hash).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = JobError::from(e);
                if !err.is_retryable() {
                    self.fail(job, &err.to_string()).await?;
                }
                return Err(err);
            }
        };

        match outcome {
            ReceiptOutcome::NotFoundYet => Err(JobError::NotYetMined),
            ReceiptOutcome::Confirming { current, required } => Err(JobError::Confirming { current, required }),
            ReceiptOutcome::Reverted => {
                self.fail(job, REVERTED_REASON).await?;
                Err(JobError::Reverted)
            }
            ReceiptOutcome::Success { block_number } => {
                let updated = within(
                    self.store_timeout,
                    "complete deposit",
                    self.ledger.update_transaction_if(
                        job.transaction_id,
                        &[TransactionStatus::Processing],
                        TransactionPatch::completed(None),
                    ),
                )
                .await?;
                if updated {
                    tracing::info!(
                        transaction_id = %job.transaction_id,
                        tx_hash = %job.tx_hash,
                        chain = %job.chain,
                        block_number,
                        amount = %job.expected_amount,
                        currency = %job.currency,
                        "Deposit confirmed"
                    );
                }
                Ok(())
            }
        }
    }

    /// Retries ran out while the receipt was missing or shallow.
    pub async fn give_up(&self, job: &VerifyDepositJob) {
        let result = async {
            claim(self.ledger.as_ref(), self.store_timeout, job.transaction_id, true).await?;
            self.fail(job, TIMED_OUT_REASON).await
        }
        .await;
        if let Err(e) = result {
            tracing::error!(
                transaction_id = %job.transaction_id,
                error = %e,
                "Could not mark timed-out deposit as failed"
            );
        }
    }

    async fn fail(&self, job: &VerifyDepositJob, reason: &str) -> Result<(), JobError> {
        let updated = within(
            self.store_timeout,
            "fail deposit",
            self.ledger.update_transaction_if(
                job.transaction_id,
                &[TransactionStatus::Processing],
                TransactionPatch::failed(reason),
            ),
        )
        .await?;
        if updated {
            tracing::warn!(
                transaction_id = %job.transaction_id,
                tx_hash = %job.tx_hash,
                chain = %job.chain,
                reason,
                "Deposit failed"
            );
        }
        Ok(())
    }
}
