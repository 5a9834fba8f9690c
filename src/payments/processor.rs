//! Job dispatch for the payment workers.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::chain::registry::ProviderRegistry;
use crate::ledger::store::LedgerStore;
use crate::payments::deposit::DepositVerifier;
use crate::payments::prize::PrizePayoutWorker;
use crate::payments::withdrawal::WithdrawalProcessor;
use crate::queue::error::JobError;
use crate::queue::job::Job;
use crate::queue::worker::JobHandler;
use crate::signer::PaymentSigner;

/// Routes each job variant to its worker. One instance serves every queue.
pub struct WalletProcessor {
    deposits: DepositVerifier,
    withdrawals: WithdrawalProcessor,
    prizes: PrizePayoutWorker,
}

impl WalletProcessor {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        providers: ProviderRegistry,
        signer: Option<Arc<dyn PaymentSigner>>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            deposits: DepositVerifier::new(ledger.clone(), providers, store_timeout),
            withdrawals: WithdrawalProcessor::new(ledger.clone(), signer.clone(), store_timeout),
            prizes: PrizePayoutWorker::new(ledger, signer, store_timeout),
        }
    }
}

#[async_trait]
impl JobHandler for WalletProcessor {
    async fn handle(&self, job: &Job, attempt: u32) -> Result<(), JobError> {
        match job {
            Job::VerifyDeposit(job) => self.deposits.verify(job, attempt).await,
            Job::ProcessWithdrawal(job) => self.withdrawals.process(job, attempt).await,
            Job::ProcessPrizePayout(job) => self.prizes.pay(job, attempt).await,
        }
    }

    async fn exhausted(&self, job: &Job, last_error: &JobError) {
        match job {
            Job::VerifyDeposit(job) => self.deposits.give_up(job).await,
            Job::ProcessWithdrawal(job) => self.withdrawals.give_up(job, last_error).await,
            Job::ProcessPrizePayout(job) => self.prizes.give_up(job, last_error),
        }
    }
}
