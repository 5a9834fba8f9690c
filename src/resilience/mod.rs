//! Resilience primitives.
//!
//! # Data Flow
//! ```text
//! Worker calls a chain provider or the ledger:
//!     → timeouts.rs (every external call has a deadline)
//!     → on retryable failure: queue redelivers after backoff.rs delay
//! ```

pub mod backoff;
pub mod timeouts;
