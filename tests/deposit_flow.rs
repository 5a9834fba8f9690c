//! Deposit verification end to end: service → queue → verifier → ledger.

use wallet_engine::chain::ReceiptOutcome;
use wallet_engine::ledger::store::LedgerStore;
use wallet_engine::ledger::{Chain, Currency, NewTransaction, TransactionStatus, TransactionType};
use wallet_engine::payments::deposit::{REVERTED_REASON, TIMED_OUT_REASON};
use wallet_engine::queue::{Disposition, Job, JobKind, JobQueue, RetryPolicy, VerifyDepositJob};

mod common;
use common::{dec, tx_hash, Harness};

#[tokio::test]
async fn test_deposit_confirms_after_receipt_appears() {
    let harness = Harness::without_signer();
    let service = harness.service();
    let hash = tx_hash(1);
    harness.receipts.script(
        &hash,
        &[ReceiptOutcome::NotFoundYet, ReceiptOutcome::Success { block_number: 42 }],
    );

    let tx = service
        .record_deposit("alice", &hash, dec("100"), Currency::UsdtEth, Chain::Ethereum)
        .await
        .unwrap();

    assert!(matches!(harness.step(JobKind::VerifyDeposit).await, Some(Disposition::Retry(_))));
    assert_eq!(service.get_balance("alice", Currency::UsdtEth).await.unwrap().total, dec("0"));

    assert_eq!(harness.step(JobKind::VerifyDeposit).await, Some(Disposition::Completed));
    let row = harness.ledger.get_transaction(tx.id).await.unwrap().unwrap();
    assert_eq!(row.status, TransactionStatus::Completed);
    assert!(row.completed_at.is_some());

    let balance = service.get_balance("alice", Currency::UsdtEth).await.unwrap();
    assert_eq!(balance.total, dec("100.00"));
    assert_eq!(balance.available, dec("100.00"));
    assert_eq!(balance.pending, dec("0"));
}

#[tokio::test]
async fn test_revert_fails_on_first_check() {
    let harness = Harness::without_signer();
    let hash = tx_hash(2);
    harness.receipts.script(&hash, &[ReceiptOutcome::Reverted]);

    let tx = harness
        .service()
        .record_deposit("alice", &hash, dec("100"), Currency::UsdtEth, Chain::Ethereum)
        .await
        .unwrap();

    assert_eq!(harness.drain(JobKind::VerifyDeposit).await, vec![Disposition::Failed]);
    assert_eq!(harness.receipts.lookups(), 1);

    let row = harness.ledger.get_transaction(tx.id).await.unwrap().unwrap();
    assert_eq!(row.status, TransactionStatus::Failed);
    assert_eq!(row.failure_reason.as_deref(), Some(REVERTED_REASON));
}

#[tokio::test]
async fn test_unmined_deposit_times_out_after_exact_budget() {
    let harness = Harness::without_signer();
    let hash = tx_hash(3);
    let tx = harness
        .service()
        .record_deposit("alice", &hash, dec("5"), Currency::Eth, Chain::Ethereum)
        .await
        .unwrap();

    for attempt in 1..10 {
        assert!(
            matches!(harness.step(JobKind::VerifyDeposit).await, Some(Disposition::Retry(_))),
            "attempt {} should be retried",
            attempt
        );
        let row = harness.ledger.get_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(row.status, TransactionStatus::Processing);
    }

    assert_eq!(harness.step(JobKind::VerifyDeposit).await, Some(Disposition::Exhausted));
    assert_eq!(harness.receipts.lookups(), 10);
    assert_eq!(harness.queue.depth(JobKind::VerifyDeposit), 0);

    let row = harness.ledger.get_transaction(tx.id).await.unwrap().unwrap();
    assert_eq!(row.status, TransactionStatus::Failed);
    assert_eq!(row.failure_reason.as_deref(), Some(TIMED_OUT_REASON));
}

#[tokio::test]
async fn test_missing_provider_is_terminal() {
    let harness = Harness::without_signer();
    let tx = harness
        .service()
        .record_deposit("alice", &tx_hash(4), dec("1"), Currency::Matic, Chain::Polygon)
        .await
        .unwrap();

    assert_eq!(harness.drain(JobKind::VerifyDeposit).await, vec![Disposition::Failed]);
    let row = harness.ledger.get_transaction(tx.id).await.unwrap().unwrap();
    assert_eq!(row.status, TransactionStatus::Failed);
    assert_eq!(row.failure_reason.as_deref(), Some("No provider for chain polygon"));
}

#[tokio::test]
async fn test_redelivery_after_completion_is_a_no_op() {
    let harness = Harness::without_signer();
    let service = harness.service();
    let hash = tx_hash(5);
    harness.receipts.script(&hash, &[ReceiptOutcome::Success { block_number: 7 }]);

    let tx = service
        .record_deposit("alice", &hash, dec("10"), Currency::Eth, Chain::Ethereum)
        .await
        .unwrap();
    // Simulate at-least-once delivery: the same job arrives twice.
    let envelope = harness.queue.try_dequeue(JobKind::VerifyDeposit).unwrap();
    harness
        .queue
        .retry_later(envelope.clone(), std::time::Duration::ZERO)
        .await
        .unwrap();
    harness
        .queue
        .retry_later(envelope, std::time::Duration::ZERO)
        .await
        .unwrap();

    harness.drain(JobKind::VerifyDeposit).await;
    let first = harness.ledger.get_transaction(tx.id).await.unwrap().unwrap();
    assert_eq!(first.status, TransactionStatus::Completed);
    assert_eq!(harness.receipts.lookups(), 1);
    assert_eq!(service.get_balance("alice", Currency::Eth).await.unwrap().total, dec("10"));
}

#[tokio::test]
async fn test_cancelled_deposit_is_never_verified() {
    let harness = Harness::without_signer();
    let service = harness.service();
    let hash = tx_hash(6);
    harness.receipts.script(&hash, &[ReceiptOutcome::Success { block_number: 1 }]);

    let tx = service
        .record_deposit("alice", &hash, dec("10"), Currency::Eth, Chain::Ethereum)
        .await
        .unwrap();
    service.cancel_transaction("alice", tx.id).await.unwrap();

    assert_eq!(harness.drain(JobKind::VerifyDeposit).await, vec![Disposition::Completed]);
    assert_eq!(harness.receipts.lookups(), 0);
    let row = harness.ledger.get_transaction(tx.id).await.unwrap().unwrap();
    assert_eq!(row.status, TransactionStatus::Cancelled);
}

#[tokio::test]
async fn test_malformed_hash_fails_without_retries() {
    let harness = Harness::without_signer();
    // A job restored from an old snapshot can carry a hash the service would now reject.
    let tx = harness
        .ledger
        .create_transaction(
            NewTransaction::new("alice", TransactionType::Deposit, dec("1"), Currency::Eth)
                .with_chain(Chain::Ethereum)
                .with_tx_hash("0xnothex"),
        )
        .await
        .unwrap();
    let job = Job::VerifyDeposit(VerifyDepositJob {
        transaction_id: tx.id,
        tx_hash: "0xnothex".into(),
        chain: Chain::Ethereum,
        expected_amount: dec("1"),
        currency: Currency::Eth,
    });
    harness.queue.enqueue(job, RetryPolicy::deposit_verification()).await.unwrap();

    assert_eq!(harness.drain(JobKind::VerifyDeposit).await, vec![Disposition::Failed]);
    assert_eq!(harness.receipts.lookups(), 1);

    let row = harness.ledger.get_transaction(tx.id).await.unwrap().unwrap();
    assert_eq!(row.status, TransactionStatus::Failed);
    assert!(row.failure_reason.unwrap().contains("Invalid transaction hash"));
}
