use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobStatus;

/// Point-in-time queue counters, analogous to a queue-depth gauge.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub ready: i64,
    pub leased: i64,
    pub deferred: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub error: i64,
    pub sync_failed: i64,
    pub queue: QueueSnapshot,
}

/// Selection criteria for `JobService::admin_cleanup`. Defaults to terminal
/// statuses only; a caller must explicitly widen `statuses` to ever touch a
/// non-terminal job.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CleanupFilter {
    pub older_than_seconds: Option<i64>,
    pub statuses: Option<Vec<JobStatus>>,
}

impl CleanupFilter {
    pub fn effective_statuses(&self) -> Vec<JobStatus> {
        self.statuses
            .clone()
            .unwrap_or_else(|| vec![JobStatus::Completed, JobStatus::Error])
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.older_than_seconds
            .map(|secs| now - chrono::Duration::seconds(secs))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupSummary {
    pub deleted: u64,
}
