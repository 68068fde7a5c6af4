//! Shared types for the inference job engine: identifiers, the job record
//! and its state machine, queue entries, sync status, and task result
//! payloads. Kept free of any storage or transport dependency so both the
//! core crate and the server crate can share one vocabulary.

pub mod error;
pub mod ids;
pub mod job;
pub mod queue_entry;
pub mod result;
pub mod stats;
pub mod sync_status;
pub mod task;

pub use error::{ModelError, Result};
pub use ids::{EntryId, JobId};
pub use job::{Job, JobPatch, JobStatus};
pub use queue_entry::QueueEntry;
pub use result::{BoundingBox, DetectedFace, JobResult};
pub use stats::{CleanupFilter, CleanupSummary, QueueSnapshot, Stats};
pub use sync_status::{SyncState, SyncStatus};
pub use task::TaskType;
