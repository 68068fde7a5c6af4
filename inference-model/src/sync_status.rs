use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Pending,
    Synced,
    Failed,
}

/// Tracks whether a completed job's result was confirmed to the
/// media-metadata collaborator. Not exposed over the HTTP surface; consumed
/// by the operational resync sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub job_id: JobId,
    pub state: SyncState,
    pub retry_count: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub fn pending(job_id: JobId) -> Self {
        SyncStatus {
            job_id,
            state: SyncState::Pending,
            retry_count: 0,
            next_retry_at: None,
            last_error: None,
        }
    }
}
