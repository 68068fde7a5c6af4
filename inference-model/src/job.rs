use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::JobId;
use crate::result::JobResult;
use crate::task::TaskType;

/// Scheduler- and caller-visible job state. `SyncFailed` is a sub-state of
/// `Completed` that records a result was produced but not yet confirmed to
/// the media-metadata collaborator; it re-enters `Completed` once the
/// resync sweep confirms delivery, or falls through to `Error` if the
/// collaborator rejects it outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
    SyncFailed,
}

impl JobStatus {
    /// Whether a job in this state holds a queue entry.
    pub fn is_schedulable(&self) -> bool {
        matches!(self, JobStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Table-driven legality check for the transition `self -> next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Error)
                | (Processing, Completed)
                | (Processing, Pending)
                | (Processing, Error)
                | (Processing, SyncFailed)
                | (SyncFailed, Completed)
                | (SyncFailed, Error)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::SyncFailed => "sync_failed",
        };
        f.write_str(s)
    }
}

/// The durable unit of work tracked by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub task_type: TaskType,
    pub media_id: String,
    pub status: JobStatus,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub error_message: Option<String>,
    pub result: Option<JobResult>,
    pub created_by: String,
}

impl Job {
    pub const MIN_PRIORITY: i32 = 0;
    pub const MAX_PRIORITY: i32 = 10;
    pub const DEFAULT_PRIORITY: i32 = 5;
    pub const DEFAULT_MAX_RETRIES: i32 = 3;

    pub fn new(task_type: TaskType, media_id: String, priority: i32, created_by: String) -> Self {
        Job {
            job_id: JobId::new(),
            task_type,
            media_id,
            status: JobStatus::Pending,
            priority,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            error_message: None,
            result: None,
            created_by,
        }
    }

    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// A restricted mutation set for an existing job row. Every field a Store
/// implementation is allowed to write lives here; callers never hand the
/// Store a whole `Job` to overwrite in place.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: Option<i32>,
    pub result: Option<JobResult>,
    pub error_message: Option<String>,
}

impl JobPatch {
    pub fn to_status(status: JobStatus) -> Self {
        JobPatch {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_cannot_go_directly_to_completed() {
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn processing_can_soft_retry_back_to_pending() {
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn completed_and_error_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::SyncFailed.is_terminal());
    }

    #[test]
    fn sync_failed_can_recover_or_fail() {
        assert!(JobStatus::SyncFailed.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::SyncFailed.can_transition_to(JobStatus::Error));
        assert!(!JobStatus::SyncFailed.can_transition_to(JobStatus::Processing));
    }
}
