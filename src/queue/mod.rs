//! Durable job queue and worker pools.
//!
//! # Data Flow
//! ```text
//! service (enqueue with RetryPolicy)
//!     → memory.rs (per-kind partitions, delayed redelivery)
//!     → worker.rs (WorkerPool → dispatch → JobHandler)
//!     → Completed | Retry(delay) | Exhausted | Failed
//! ```
//!
//! Delivery is at-least-once. Handlers rely on conditional ledger updates, not on
//! queue ordering, to stay idempotent.

pub mod error;
pub mod job;
pub mod memory;
pub mod policy;
pub mod worker;

pub use error::JobError;
pub use job::{Envelope, Job, JobKind, PrizePayoutJob, ProcessWithdrawalJob, VerifyDepositJob};
pub use memory::{JobQueue, MemoryQueue, QueueError, QueueResult};
pub use policy::{Backoff, RetryPolicy};
pub use worker::{dispatch, Disposition, JobHandler, WorkerPool};
