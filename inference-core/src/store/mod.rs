mod postgres;

pub use postgres::PostgresStore;

use async_trait::async_trait;
use inference_model::{EntryId, Job, JobId, JobPatch, JobStatus, TaskType};

use crate::error::Result;

/// Transactional persistence for jobs. Implementations must enforce the
/// `(media_id, task_type)` uniqueness invariant and the status transition
/// table in `JobStatus::can_transition_to` atomically with every mutation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_job(&self, job: Job) -> Result<Job>;
    async fn load_job(&self, job_id: JobId) -> Result<Job>;
    async fn update_job(&self, job_id: JobId, patch: JobPatch) -> Result<Job>;
    async fn delete_job(&self, job_id: JobId) -> Result<()>;

    /// Runs the job-creation-and-enqueue sequence under a single
    /// serializable-or-stronger transaction so a crash between the two
    /// writes can never leave a job stored with no queue entry, or a queue
    /// entry pointing at a job that was never committed.
    async fn within_transaction(&self, job: Job, priority: i32) -> Result<(Job, EntryId)>;

    /// Applies a terminal-status patch (`Completed` or `Error`) and deletes
    /// the job's queue entry in a single transaction, so a crash between the
    /// two writes can never leave a completed/failed job still holding a
    /// live queue entry, or a deleted queue entry whose job never actually
    /// reached a terminal state.
    async fn commit_terminal(
        &self,
        job_id: JobId,
        patch: JobPatch,
        entry_id: EntryId,
    ) -> Result<Job>;

    /// `None` when no non-terminal/non-purged job exists for this pair.
    async fn find_active_by_media(
        &self,
        media_id: &str,
        task_type: TaskType,
    ) -> Result<Option<Job>>;

    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;

    async fn list_for_cleanup(
        &self,
        statuses: &[JobStatus],
        older_than: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Vec<JobId>>;
}
