use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EntryId, JobId};

/// Binds a schedulable job to the durable queue. Deleted on acknowledgement
/// (terminal success or terminal failure); recreated on soft retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub entry_id: EntryId,
    pub job_id: JobId,
    pub priority: i32,
    pub enqueued_at: DateTime<Utc>,
    pub lease_holder: Option<String>,
    pub leased_until: Option<DateTime<Utc>>,
}

impl QueueEntry {
    pub fn new(job_id: JobId, priority: i32) -> Self {
        QueueEntry {
            entry_id: EntryId::new(),
            job_id,
            priority,
            enqueued_at: Utc::now(),
            lease_holder: None,
            leased_until: None,
        }
    }

    pub fn is_leased(&self, now: DateTime<Utc>) -> bool {
        matches!(self.leased_until, Some(until) if until > now)
    }
}
