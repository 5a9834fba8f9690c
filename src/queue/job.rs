//! Typed job payloads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::ledger::asset::{Chain, Currency};
use crate::queue::policy::RetryPolicy;

/// Logical queue a job is routed to. Each kind has its own workers and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    VerifyDeposit,
    ProcessWithdrawal,
    ProcessPrizePayout,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::VerifyDeposit,
        JobKind::ProcessWithdrawal,
        JobKind::ProcessPrizePayout,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::VerifyDeposit => "verify-deposit",
            JobKind::ProcessWithdrawal => "process-withdrawal",
            JobKind::ProcessPrizePayout => "process-prize-payout",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyDepositJob {
    pub transaction_id: Uuid,
    pub tx_hash: String,
    pub chain: Chain,
    pub expected_amount: Decimal,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessWithdrawalJob {
    pub transaction_id: Uuid,
    pub user_id: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub to_address: String,
    pub chain: Chain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizePayoutJob {
    pub user_id: String,
    pub tournament_id: String,
    pub amount: Decimal,
    pub currency: Currency,
}

/// A unit of work, dispatched on its tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Job {
    VerifyDeposit(VerifyDepositJob),
    ProcessWithdrawal(ProcessWithdrawalJob),
    ProcessPrizePayout(PrizePayoutJob),
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::VerifyDeposit(_) => JobKind::VerifyDeposit,
            Job::ProcessWithdrawal(_) => JobKind::ProcessWithdrawal,
            Job::ProcessPrizePayout(_) => JobKind::ProcessPrizePayout,
        }
    }

    /// Ledger row the job acts on, when it already exists.
    pub fn transaction_id(&self) -> Option<Uuid> {
        match self {
            Job::VerifyDeposit(job) => Some(job.transaction_id),
            Job::ProcessWithdrawal(job) => Some(job.transaction_id),
            Job::ProcessPrizePayout(_) => None,
        }
    }
}

/// A job plus its delivery bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub job: Job,
    pub policy: RetryPolicy,
    /// Completed delivery attempts so far.
    pub attempts_made: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(job: Job, policy: RetryPolicy) -> Self {
        Self {
            id: Uuid::new_v4(),
            job,
            policy,
            attempts_made: 0,
            enqueued_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> JobKind {
        self.job.kind()
    }
}
