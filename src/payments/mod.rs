//! Payment workers.
//!
//! # Data Flow
//! ```text
//! queue (Job) → processor.rs (WalletProcessor dispatches by tag)
//!     → deposit.rs    (receipt lookup → COMPLETED | FAILED | retry)
//!     → withdrawal.rs (signer submit → COMPLETED | FAILED, never retried)
//!     → prize.rs      (dedupe on reference key → submit → annotate entry)
//! ```
//!
//! Every ledger call carries a deadline. Every status change is a conditional update,
//! so a redelivered job that finds its row already settled does nothing.

pub mod deposit;
pub mod prize;
pub mod processor;
pub mod withdrawal;

use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::ledger::store::{LedgerResult, LedgerStore};
use crate::ledger::types::{TransactionPatch, TransactionStatus};
use crate::queue::error::JobError;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::timeouts::with_deadline;

pub use deposit::DepositVerifier;
pub use prize::{reconcile_annotations, PrizePayoutWorker, ReconcileReport};
pub use processor::WalletProcessor;
pub use withdrawal::WithdrawalProcessor;

/// Writes of a broadcast payment's hash made before the job gives up.
const RECORD_ATTEMPTS: u32 = 3;

/// Run a ledger call under the store deadline.
pub(crate) async fn within<T, F>(deadline: Duration, operation: &'static str, fut: F) -> Result<T, JobError>
where
    F: Future<Output = LedgerResult<T>>,
{
    Ok(with_deadline(operation, deadline, fut).await??)
}

/// Move a row from PENDING to PROCESSING for this delivery.
///
/// Returns `false` when the handler must not proceed: the row is settled, or it is
/// already PROCESSING and `resume` is off.
pub(crate) async fn claim(
    ledger: &dyn LedgerStore,
    deadline: Duration,
    id: Uuid,
    resume: bool,
) -> Result<bool, JobError> {
    for _ in 0..2 {
        let row = within(deadline, "load transaction", ledger.get_transaction(id))
            .await?
            .ok_or_else(|| JobError::Rejected(format!("Transaction {} not found", id)))?;

        match row.status {
            TransactionStatus::Pending => {
                let claimed = within(
                    deadline,
                    "claim transaction",
                    ledger.update_transaction_if(id, &[TransactionStatus::Pending], TransactionPatch::processing()),
                )
                .await?;
                if claimed {
                    return Ok(true);
                }
                // Lost the race; look again.
            }
            TransactionStatus::Processing if resume => return Ok(true),
            TransactionStatus::Processing => {
                tracing::warn!(transaction_id = %id, "Transaction already processing, skipping redelivery");
                return Ok(false);
            }
            status => {
                tracing::debug!(transaction_id = %id, status = %status, "Transaction already settled");
                return Ok(false);
            }
        }
    }
    Ok(false)
}

/// Complete a PROCESSING row with the hash of a payment that is already on the wire.
///
/// Only the ledger write is retried, never the submission. When every write fails the
/// hash survives only in the logs and the error is terminal. Returns `false` when the
/// row was no longer PROCESSING.
pub(crate) async fn record_broadcast(
    ledger: &dyn LedgerStore,
    deadline: Duration,
    id: Uuid,
    tx_hash: &str,
) -> Result<bool, JobError> {
    tracing::info!(transaction_id = %id, tx_hash, "Payment broadcast");

    let mut attempt = 0;
    let err = loop {
        attempt += 1;
        let write = ledger.update_transaction_if(
            id,
            &[TransactionStatus::Processing],
            TransactionPatch::completed(Some(tx_hash.to_string())),
        );
        match within(deadline, "record payment", write).await {
            Ok(updated) => return Ok(updated),
            Err(e) if e.is_retryable() && attempt < RECORD_ATTEMPTS => {
                tracing::warn!(transaction_id = %id, tx_hash, attempt, error = %e, "Retrying payment record");
                tokio::time::sleep(calculate_backoff(attempt, 100, 1_000)).await;
            }
            Err(e) => break e,
        }
    };

    tracing::error!(
        transaction_id = %id,
        tx_hash,
        error = %err,
        "Payment broadcast but not recorded, manual review required"
    );
    Err(JobError::Unresolved {
        transaction_id: id,
        detail: format!("broadcast as {} but the ledger write failed: {}", tx_hash, err),
    })
}
