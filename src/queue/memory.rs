//! Job queue contract and the in-process implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::observability::metrics;
use crate::queue::job::{Envelope, Job, JobKind};
use crate::queue::policy::RetryPolicy;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue persistence error: {0}")]
    Persistence(String),

    #[error("queue is closed")]
    Closed,
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Durable at-least-once job queue, partitioned by job kind.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Add a job with its retry policy. Returns the envelope id.
    async fn enqueue(&self, job: Job, policy: RetryPolicy) -> QueueResult<Uuid>;

    /// Wait for the next ready job of `kind`.
    async fn dequeue(&self, kind: JobKind) -> Option<Envelope>;

    /// Return a failed job for redelivery after `delay`.
    async fn retry_later(&self, envelope: Envelope, delay: Duration) -> QueueResult<()>;

    /// Jobs of `kind` that are ready or waiting out a backoff delay.
    fn depth(&self, kind: JobKind) -> usize;
}

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    envelopes: Vec<Envelope>,
}

struct Partition {
    ready: Mutex<VecDeque<Envelope>>,
    notify: Notify,
}

impl Partition {
    fn new() -> Self {
        Self {
            ready: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// A panic elsewhere while holding the lock leaves the deque intact, so keep using it.
    fn ready(&self) -> MutexGuard<'_, VecDeque<Envelope>> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, envelope: Envelope) {
        self.ready().push_back(envelope);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Envelope> {
        self.ready().pop_front()
    }

    fn len(&self) -> usize {
        self.ready().len()
    }
}

struct Inner {
    partitions: HashMap<JobKind, Partition>,
    /// Jobs sleeping out their backoff, kept so a snapshot does not lose them.
    delayed: DashMap<Uuid, Envelope>,
    snapshot_path: Option<PathBuf>,
}

impl Inner {
    fn partition(&self, kind: JobKind) -> &Partition {
        // Every kind is inserted at construction.
        &self.partitions[&kind]
    }

    fn push(&self, envelope: Envelope) {
        let kind = envelope.kind();
        self.partition(kind).push(envelope);
        metrics::set_queue_depth(kind.name(), self.depth(kind));
    }

    fn depth(&self, kind: JobKind) -> usize {
        let delayed = self.delayed.iter().filter(|r| r.value().kind() == kind).count();
        self.partition(kind).len() + delayed
    }
}

/// In-process queue with per-kind partitions and JSON snapshot persistence.
#[derive(Clone)]
pub struct MemoryQueue {
    inner: Arc<Inner>,
}

impl MemoryQueue {
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        let partitions = JobKind::ALL.iter().map(|kind| (*kind, Partition::new())).collect();
        Self {
            inner: Arc::new(Inner {
                partitions,
                delayed: DashMap::new(),
                snapshot_path,
            }),
        }
    }

    /// Restore unprocessed jobs from a snapshot. Jobs that were waiting on a backoff
    /// delay become ready immediately.
    pub fn load_from_file(path: &Path) -> QueueResult<Self> {
        let queue = Self::new(Some(path.to_path_buf()));
        if !path.exists() {
            return Ok(queue);
        }

        let file = File::open(path).map_err(|e| QueueError::Persistence(e.to_string()))?;
        let snapshot: Snapshot =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| QueueError::Persistence(e.to_string()))?;

        let restored = snapshot.envelopes.len();
        for envelope in snapshot.envelopes {
            queue.inner.push(envelope);
        }
        tracing::info!(path = %path.display(), restored, "Restored queued jobs");
        Ok(queue)
    }

    /// Persist every unprocessed job, if a snapshot path is configured.
    pub fn save_to_file(&self) -> QueueResult<()> {
        let Some(path) = &self.inner.snapshot_path else {
            return Ok(());
        };

        let mut envelopes: Vec<Envelope> = Vec::new();
        for partition in self.inner.partitions.values() {
            envelopes.extend(partition.ready().iter().cloned());
        }
        envelopes.extend(self.inner.delayed.iter().map(|r| r.value().clone()));

        let file = File::create(path).map_err(|e| QueueError::Persistence(e.to_string()))?;
        serde_json::to_writer(BufWriter::new(file), &Snapshot { envelopes })
            .map_err(|e| QueueError::Persistence(e.to_string()))?;
        tracing::info!(path = %path.display(), "Saved queue snapshot");
        Ok(())
    }

    /// Depth of every partition, keyed by queue name.
    pub fn depths(&self) -> BTreeMap<&'static str, usize> {
        JobKind::ALL
            .iter()
            .map(|kind| (kind.name(), self.inner.depth(*kind)))
            .collect()
    }

    /// Take the next ready job without waiting.
    pub fn try_dequeue(&self, kind: JobKind) -> Option<Envelope> {
        let envelope = self.inner.partition(kind).pop();
        if envelope.is_some() {
            metrics::set_queue_depth(kind.name(), self.inner.depth(kind));
        }
        envelope
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: Job, policy: RetryPolicy) -> QueueResult<Uuid> {
        let envelope = Envelope::new(job, policy);
        let id = envelope.id;
        tracing::debug!(job_id = %id, queue = %envelope.kind(), "Job enqueued");
        self.inner.push(envelope);
        Ok(id)
    }

    async fn dequeue(&self, kind: JobKind) -> Option<Envelope> {
        let partition = self.inner.partition(kind);
        loop {
            let notified = partition.notify.notified();
            if let Some(envelope) = self.try_dequeue(kind) {
                return Some(envelope);
            }
            notified.await;
        }
    }

    async fn retry_later(&self, envelope: Envelope, delay: Duration) -> QueueResult<()> {
        if delay.is_zero() {
            self.inner.push(envelope);
            return Ok(());
        }

        let id = envelope.id;
        self.inner.delayed.insert(id, envelope);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some((_, envelope)) = inner.delayed.remove(&id) {
                inner.push(envelope);
            }
        });
        Ok(())
    }

    fn depth(&self, kind: JobKind) -> usize {
        self.inner.depth(kind)
    }
}
