mod postgres;

pub use postgres::PostgresPriorityQueue;

use async_trait::async_trait;
use inference_model::{EntryId, JobId, QueueSnapshot};

use crate::error::Result;

/// A leased, priority-ordered view over schedulable jobs. Implementations
/// must guarantee that `lease` never hands the same entry to two callers
/// while a lease is outstanding (see `JobStatus`/queue invariants).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriorityQueue: Send + Sync {
    async fn enqueue(&self, job_id: JobId, priority: i32) -> Result<EntryId>;

    /// Atomically selects and leases the next schedulable entry, or
    /// returns `None` if nothing is ready.
    async fn lease(&self, worker_id: &str, lease_duration: std::time::Duration)
    -> Result<Option<LeasedEntry>>;

    /// Extends an outstanding lease by `extend_by`. Fails with `NotFound`
    /// if the lease has already expired or been acked.
    async fn renew(&self, entry_id: EntryId, extend_by: std::time::Duration) -> Result<()>;

    /// Removes the entry: terminal outcome (success or permanent failure).
    async fn ack(&self, entry_id: EntryId) -> Result<()>;

    /// Releases the lease and makes the entry schedulable again after
    /// `visible_after`, for a soft retry.
    async fn nack(&self, entry_id: EntryId, visible_after: std::time::Duration) -> Result<()>;

    /// Returns leases whose TTL has elapsed to the unleased state. Returns
    /// the number of entries resurrected.
    async fn reap_expired(&self) -> Result<u64>;

    async fn snapshot(&self) -> Result<QueueSnapshot>;
}

#[derive(Debug, Clone)]
pub struct LeasedEntry {
    pub entry_id: EntryId,
    pub job_id: JobId,
}
