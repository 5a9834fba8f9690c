//! Deadlines for calls into external systems.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The wrapped call did not finish before its deadline.
#[derive(Debug, Clone, Copy, Error)]
#[error("{operation} timed out after {secs} seconds")]
pub struct Elapsed {
    pub operation: &'static str,
    pub secs: u64,
}

/// Run `fut` with a deadline, tagging the timeout with the operation name for logs.
pub async fn with_deadline<F, T>(operation: &'static str, deadline: Duration, fut: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, fut).await.map_err(|_| {
        tracing::warn!(operation, secs = deadline.as_secs(), "Call exceeded deadline");
        Elapsed {
            operation,
            secs: deadline.as_secs(),
        }
    })
}
