use std::time::Duration;

use chrono::Utc;
use inference_model::{Job, JobPatch, JobStatus};
use rand::Rng;
use serde_json::json;
use tracing::{Instrument, error, info, info_span, warn};

use crate::broadcaster::{CompletedEventPayload, EventKind, FailedEventPayload};
use crate::error::CoreError;
use crate::runtime::Runtime;
use crate::vector_sink::{FACE_EMBEDDINGS_COLLECTION, IMAGE_EMBEDDINGS_COLLECTION, VectorPoint, face_point_id};

const FETCH_DEADLINE: Duration = Duration::from_secs(30);

/// Drives leased queue entries through the job lifecycle: lease, load,
/// transition to processing, execute, commit, ack, broadcast. Runs as a
/// single async task per worker instance; horizontal scale comes from
/// running more instances, which compete safely over the lease protocol.
pub struct Worker {
    runtime: Runtime,
    worker_id: String,
}

impl Worker {
    pub fn new(runtime: Runtime, worker_id: impl Into<String>) -> Self {
        Worker {
            runtime,
            worker_id: worker_id.into(),
        }
    }

    /// Runs the main loop until `shutdown` resolves. Intended to be spawned
    /// as its own task; callers typically race this against a signal
    /// handler future.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let poll_interval = self.runtime.config.worker.poll_interval;
        let lease_duration = self.runtime.config.worker.lease_duration;

        loop {
            if *shutdown.borrow() {
                info!(worker_id = %self.worker_id, "worker shutting down");
                return;
            }

            if let Err(e) = self.runtime.queue.reap_expired().await {
                warn!("reap_expired failed: {e}");
            }

            let leased = match self.runtime.queue.lease(&self.worker_id, lease_duration).await {
                Ok(leased) => leased,
                Err(e) => {
                    error!("lease attempt failed: {e}");
                    None
                }
            };

            let Some(leased) = leased else {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = shutdown.changed() => {}
                }
                continue;
            };

            let span = info_span!("job", job_id = %leased.job_id, worker_id = %self.worker_id);
            self.process_entry(leased, lease_duration).instrument(span).await;
        }
    }

    async fn process_entry(
        &self,
        leased: crate::queue::LeasedEntry,
        lease_duration: Duration,
    ) {
        let job = match self.runtime.store.load_job(leased.job_id).await {
            Ok(job) => job,
            Err(CoreError::NotFound(_)) => {
                // Deleted while queued; discard without touching anything.
                let _ = self.runtime.queue.ack(leased.entry_id).await;
                return;
            }
            Err(e) => {
                error!("failed to load leased job: {e}");
                let _ = self.runtime.queue.nack(leased.entry_id, Duration::from_secs(5)).await;
                return;
            }
        };

        if job.status != JobStatus::Pending {
            // Stale entry: already advanced by a previous attempt.
            let _ = self.runtime.queue.ack(leased.entry_id).await;
            return;
        }

        let job = match self
            .runtime
            .store
            .update_job(
                job.job_id,
                JobPatch {
                    status: Some(JobStatus::Processing),
                    started_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(job) => job,
            Err(e) => {
                error!("failed to transition job to processing: {e}");
                let _ = self.runtime.queue.nack(leased.entry_id, Duration::from_secs(5)).await;
                return;
            }
        };

        let renew_handle = self.spawn_lease_renewal(leased.entry_id, lease_duration);
        let outcome = self.execute(&job).await;
        renew_handle.abort();

        match outcome {
            Ok(result) => {
                let result_json = serde_json::to_value(&result).unwrap_or_else(|_| json!({}));
                match self
                    .runtime
                    .store
                    .commit_terminal(
                        job.job_id,
                        JobPatch {
                            status: Some(JobStatus::Completed),
                            completed_at: Some(Utc::now()),
                            result: Some(result),
                            ..Default::default()
                        },
                        leased.entry_id,
                    )
                    .await
                {
                    Ok(_) => {
                        self.runtime
                            .broadcaster
                            .publish(
                                job.job_id,
                                EventKind::Completed,
                                serde_json::to_value(CompletedEventPayload {
                                    job_id: job.job_id,
                                    task_type: job.task_type.as_str(),
                                    status: "completed",
                                    result_summary: result_json,
                                    timestamp_ms: Utc::now().timestamp_millis(),
                                })
                                .unwrap_or_else(|_| json!({})),
                            )
                            .await;
                        info!(job_id = %job.job_id, "job completed");
                    }
                    Err(CoreError::NotFound(_)) => {
                        // Deleted concurrently; discard the result, no broadcast.
                        let _ = self.runtime.queue.ack(leased.entry_id).await;
                    }
                    Err(e) => {
                        error!("failed to commit completed result: {e}");
                        let _ = self
                            .runtime
                            .queue
                            .nack(leased.entry_id, Duration::from_secs(5))
                            .await;
                    }
                }
            }
            Err(failure) => self.handle_failure(&job, leased.entry_id, failure).await,
        }
    }

    async fn execute(&self, job: &Job) -> Result<inference_model::JobResult, CoreError> {
        let media = self
            .runtime
            .media_fetcher
            .fetch(&job.media_id, FETCH_DEADLINE)
            .await?;

        let result = self
            .runtime
            .inference_engine
            .infer(job.task_type, media.bytes)
            .await?;

        if job.task_type.produces_vectors() {
            self.write_vectors(job, &result).await?;
        }

        Ok(result)
    }

    async fn write_vectors(
        &self,
        job: &Job,
        result: &inference_model::JobResult,
    ) -> Result<(), CoreError> {
        let media_id_numeric = numeric_media_id(&job.media_id);

        match result {
            inference_model::JobResult::ImageEmbedding { vector, .. } => {
                let point = VectorPoint {
                    id: media_id_numeric,
                    vector: vector.clone(),
                    payload: json!({
                        "job_id": job.job_id,
                        "media_id": job.media_id,
                        "task_type": job.task_type.as_str(),
                    }),
                };
                self.runtime
                    .vector_sink
                    .upsert(IMAGE_EMBEDDINGS_COLLECTION, vec![point])
                    .await
            }
            inference_model::JobResult::FaceEmbedding { faces, .. } => {
                let points = faces
                    .iter()
                    .filter_map(|face| {
                        let vector = face.vector.clone()?;
                        Some(VectorPoint {
                            id: face_point_id(media_id_numeric, face.face_index),
                            vector,
                            payload: json!({
                                "job_id": job.job_id,
                                "media_id": job.media_id,
                                "face_index": face.face_index,
                                "bbox": face.bbox,
                                "confidence": face.confidence,
                            }),
                        })
                    })
                    .collect();
                self.runtime
                    .vector_sink
                    .upsert(FACE_EMBEDDINGS_COLLECTION, points)
                    .await
            }
            inference_model::JobResult::FaceDetection { .. } => Ok(()),
        }
    }

    async fn handle_failure(
        &self,
        job: &Job,
        entry_id: inference_model::EntryId,
        failure: CoreError,
    ) {
        let retryable = failure.is_retryable();
        let retries_exhausted = job.retries_exhausted();

        if retryable && !retries_exhausted {
            let next_retry_count = job.retry_count + 1;
            let backoff = backoff_for_attempt(next_retry_count);
            match self
                .runtime
                .store
                .update_job(
                    job.job_id,
                    JobPatch {
                        status: Some(JobStatus::Pending),
                        retry_count: Some(next_retry_count),
                        ..Default::default()
                    },
                )
                .await
            {
                Ok(_) => {
                    let _ = self.runtime.queue.nack(entry_id, backoff).await;
                    warn!(job_id = %job.job_id, retry_count = next_retry_count, "job soft-retried: {failure}");
                }
                Err(CoreError::NotFound(_)) => {
                    let _ = self.runtime.queue.ack(entry_id).await;
                }
                Err(e) => error!("failed to record retry: {e}"),
            }
            return;
        }

        let error_message = failure.to_string();
        match self
            .runtime
            .store
            .commit_terminal(
                job.job_id,
                JobPatch {
                    status: Some(JobStatus::Error),
                    completed_at: Some(Utc::now()),
                    error_message: Some(error_message.clone()),
                    ..Default::default()
                },
                entry_id,
            )
            .await
        {
            Ok(_) => {
                self.runtime
                    .broadcaster
                    .publish(
                        job.job_id,
                        EventKind::Failed,
                        serde_json::to_value(FailedEventPayload {
                            job_id: job.job_id,
                            status: "error",
                            error_message: &error_message,
                            retry_count: job.retry_count,
                            timestamp_ms: Utc::now().timestamp_millis(),
                        })
                        .unwrap_or_else(|_| json!({})),
                    )
                    .await;
                error!(job_id = %job.job_id, "job failed terminally: {error_message}");
            }
            Err(CoreError::NotFound(_)) => {
                let _ = self.runtime.queue.ack(entry_id).await;
            }
            Err(e) => error!("failed to record terminal failure: {e}"),
        }
    }

    /// Renews the lease at half its TTL for as long as the execute phase
    /// stays in flight, so a slow inference call never outruns the lease
    /// and invites a second worker to pick up the same entry.
    fn spawn_lease_renewal(
        &self,
        entry_id: inference_model::EntryId,
        lease_duration: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let queue = self.runtime.queue.clone();
        let renew_every = lease_duration / 2;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(renew_every).await;
                if let Err(e) = queue.renew(entry_id, lease_duration).await {
                    warn!("lease renewal failed: {e}");
                    return;
                }
            }
        })
    }
}

fn backoff_for_attempt(attempt: i32) -> Duration {
    let base_ms = 500u64 * 2u64.saturating_pow(attempt.max(0) as u32 - 1);
    let capped_ms = base_ms.min(30_000);
    let jitter_ms: u64 = rand::rng().random_range(0..=capped_ms / 4 + 1);
    Duration::from_millis(capped_ms + jitter_ms)
}

/// Collapses an opaque `media_id` string into a stable u64 for use as a
/// vector-store point id. Content-addressed, not randomized, so repeated
/// upserts for the same media land on the same point.
fn numeric_media_id(media_id: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    media_id.hash(&mut hasher);
    hasher.finish() & 0x0000_FFFF_FFFF_FFFF
}
