use std::str::FromStr;

use chrono::Utc;
use inference_model::{CleanupFilter, CleanupSummary, Job, JobId, JobPatch, JobStatus, Stats, TaskType};
use tracing::info;

use crate::error::{CoreError, Result};
use crate::runtime::Runtime;

/// The pure-logic facade the API layer calls into. Holds no state of its
/// own beyond a `Runtime` handle; every method is a thin, auditable
/// composition of `Store` and `PriorityQueue` operations.
pub struct JobService {
    runtime: Runtime,
}

impl JobService {
    pub fn new(runtime: Runtime) -> Self {
        JobService { runtime }
    }

    pub async fn submit(
        &self,
        task_type_str: &str,
        media_id: String,
        priority: Option<i32>,
        created_by: String,
    ) -> Result<Job> {
        let task_type = TaskType::from_str(task_type_str)
            .map_err(|e| CoreError::InvalidInput(e.to_string()))?;

        let priority = priority.unwrap_or(Job::DEFAULT_PRIORITY);
        if !(Job::MIN_PRIORITY..=Job::MAX_PRIORITY).contains(&priority) {
            return Err(CoreError::InvalidInput(format!(
                "priority {priority} is out of range [{}, {}]",
                Job::MIN_PRIORITY,
                Job::MAX_PRIORITY
            )));
        }
        if media_id.trim().is_empty() {
            return Err(CoreError::InvalidInput("media_id must not be empty".into()));
        }

        if self
            .runtime
            .store
            .find_active_by_media(&media_id, task_type)
            .await?
            .is_some()
        {
            return Err(CoreError::DuplicateJob);
        }

        let mut job = Job::new(task_type, media_id, priority, created_by);
        job.max_retries = self.runtime.config.worker.max_retries;

        let (job, _entry_id) = self.runtime.store.within_transaction(job, priority).await?;
        info!(job_id = %job.job_id, %task_type, "job submitted");
        Ok(job)
    }

    pub async fn get(&self, job_id: JobId) -> Result<Job> {
        self.runtime.store.load_job(job_id).await
    }

    pub async fn delete(&self, job_id: JobId) -> Result<()> {
        self.runtime.store.delete_job(job_id).await
    }

    pub async fn admin_stats(&self) -> Result<Stats> {
        let pending = self.runtime.store.count_by_status(JobStatus::Pending).await?;
        let processing = self
            .runtime
            .store
            .count_by_status(JobStatus::Processing)
            .await?;
        let completed = self
            .runtime
            .store
            .count_by_status(JobStatus::Completed)
            .await?;
        let error = self.runtime.store.count_by_status(JobStatus::Error).await?;
        let sync_failed = self
            .runtime
            .store
            .count_by_status(JobStatus::SyncFailed)
            .await?;
        let queue = self.runtime.queue.snapshot().await?;

        Ok(Stats {
            pending,
            processing,
            completed,
            error,
            sync_failed,
            queue,
        })
    }

    /// Bulk terminal-state deletion. Never touches a non-terminal job
    /// unless the caller explicitly widens `filter.statuses` to include it.
    pub async fn admin_cleanup(&self, filter: CleanupFilter) -> Result<CleanupSummary> {
        let statuses = filter.effective_statuses();
        let cutoff = filter.cutoff(Utc::now());

        let ids = self.runtime.store.list_for_cleanup(&statuses, cutoff).await?;
        let mut deleted = 0u64;
        for job_id in ids {
            if self.runtime.store.delete_job(job_id).await.is_ok() {
                deleted += 1;
            }
        }
        info!(deleted, "admin_cleanup completed");
        Ok(CleanupSummary { deleted })
    }

    /// Retries `sync_failed -> completed` for jobs whose result was never
    /// confirmed to the media-metadata collaborator. Not exposed over
    /// HTTP; invoked by an operational sweep.
    pub async fn resync_pending(&self, job_ids: Vec<JobId>) -> Result<u64> {
        let mut resynced = 0u64;
        for job_id in job_ids {
            let job = self.runtime.store.load_job(job_id).await?;
            if job.status != JobStatus::SyncFailed {
                continue;
            }
            self.runtime
                .store
                .update_job(job_id, JobPatch::to_status(JobStatus::Completed))
                .await?;
            resynced += 1;
        }
        Ok(resynced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtAuthGate;
    use crate::broadcaster::MockBroadcaster;
    use crate::config::{RuntimeConfig, WorkerTuning};
    use crate::inference_engine::MockInferenceEngine;
    use crate::media_fetcher::MockMediaFetcher;
    use crate::queue::MockPriorityQueue;
    use crate::store::MockStore;
    use crate::vector_sink::MockVectorSink;
    use inference_model::{EntryId, QueueSnapshot};
    use std::sync::Arc;

    fn test_config() -> RuntimeConfig {
        RuntimeConfig {
            data_dir: "./data".into(),
            db_url: "postgres://test".into(),
            db_max_connections: 1,
            db_min_connections: 1,
            vector_store_url: "http://localhost".into(),
            media_store_url: "http://localhost".into(),
            broker_host: "localhost".into(),
            broker_port: 6379,
            public_key_path: None,
            auth_disabled: true,
            server_host: "0.0.0.0".into(),
            server_port: 0,
            worker: WorkerTuning::default(),
        }
    }

    fn runtime_with(store: MockStore, queue: MockPriorityQueue) -> Runtime {
        Runtime {
            config: Arc::new(test_config()),
            store: Arc::new(store),
            queue: Arc::new(queue),
            media_fetcher: Arc::new(MockMediaFetcher::new()),
            vector_sink: Arc::new(MockVectorSink::new()),
            inference_engine: Arc::new(MockInferenceEngine::new()),
            broadcaster: Arc::new(MockBroadcaster::new()),
            auth_gate: Arc::new(JwtAuthGate::new(None, true).unwrap()),
        }
    }

    #[tokio::test]
    async fn submit_rejects_priority_out_of_range() {
        let store = MockStore::new();
        let queue = MockPriorityQueue::new();
        let service = JobService::new(runtime_with(store, queue));

        let err = service
            .submit("image_embedding", "m1".into(), Some(99), "tester".into())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn submit_rejects_empty_media_id() {
        let store = MockStore::new();
        let queue = MockPriorityQueue::new();
        let service = JobService::new(runtime_with(store, queue));

        let err = service
            .submit("image_embedding", "  ".into(), None, "tester".into())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn submit_rejects_unknown_task_type() {
        let store = MockStore::new();
        let queue = MockPriorityQueue::new();
        let service = JobService::new(runtime_with(store, queue));

        let err = service
            .submit("video_embedding", "m1".into(), None, "tester".into())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn submit_rejects_duplicate_active_media() {
        let mut store = MockStore::new();
        store
            .expect_find_active_by_media()
            .returning(|media_id, task_type| {
                Ok(Some(Job::new(
                    task_type,
                    media_id.to_string(),
                    5,
                    "someone-else".into(),
                )))
            });
        let queue = MockPriorityQueue::new();
        let service = JobService::new(runtime_with(store, queue));

        let err = service
            .submit("image_embedding", "m1".into(), None, "tester".into())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateJob));
    }

    #[tokio::test]
    async fn submit_enqueues_a_fresh_job() {
        let mut store = MockStore::new();
        store
            .expect_find_active_by_media()
            .returning(|_, _| Ok(None));
        store
            .expect_within_transaction()
            .withf(|_, priority| *priority == 7)
            .returning(|job, _| Ok((job, EntryId::new())));
        let queue = MockPriorityQueue::new();
        let service = JobService::new(runtime_with(store, queue));

        let job = service
            .submit("face_detection", "m2".into(), Some(7), "tester".into())
            .await
            .unwrap();
        assert_eq!(job.priority, 7);
        assert_eq!(job.task_type, TaskType::FaceDetection);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn admin_stats_aggregates_counts_and_queue_snapshot() {
        let mut store = MockStore::new();
        store
            .expect_count_by_status()
            .returning(|status| match status {
                JobStatus::Pending => Ok(3),
                JobStatus::Processing => Ok(1),
                JobStatus::Completed => Ok(40),
                JobStatus::Error => Ok(2),
                JobStatus::SyncFailed => Ok(0),
            });
        let mut queue = MockPriorityQueue::new();
        queue.expect_snapshot().returning(|| {
            Ok(QueueSnapshot {
                ready: 3,
                leased: 1,
                deferred: 0,
            })
        });
        let service = JobService::new(runtime_with(store, queue));

        let stats = service.admin_stats().await.unwrap();
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.completed, 40);
        assert_eq!(stats.queue.ready, 3);
    }

    #[tokio::test]
    async fn admin_cleanup_only_deletes_listed_ids() {
        let mut store = MockStore::new();
        let ids = vec![JobId::new(), JobId::new()];
        let ids_for_list = ids.clone();
        store
            .expect_list_for_cleanup()
            .return_once(move |_, _| Ok(ids_for_list));
        store.expect_delete_job().returning(|_| Ok(()));
        let queue = MockPriorityQueue::new();
        let service = JobService::new(runtime_with(store, queue));

        let summary = service
            .admin_cleanup(CleanupFilter::default())
            .await
            .unwrap();
        assert_eq!(summary.deleted, ids.len() as u64);
    }
}
