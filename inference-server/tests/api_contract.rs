use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use inference_core::{
    Broadcaster, EventKind, FetchedMedia, InferenceEngine, JwtAuthGate, LeasedEntry,
    MediaFetcher, PriorityQueue, Runtime, RuntimeConfig, Store, VectorPoint, VectorSink,
};
use inference_model::{
    EntryId, Job, JobId, JobPatch, JobResult, JobStatus, QueueSnapshot, TaskType,
};
use serde_json::Value;

#[derive(Default, Clone)]
struct FakeStore {
    jobs: Arc<Mutex<HashMap<JobId, Job>>>,
}

#[async_trait]
impl Store for FakeStore {
    async fn create_job(&self, job: Job) -> inference_core::Result<Job> {
        self.jobs.lock().unwrap().insert(job.job_id, job.clone());
        Ok(job)
    }

    async fn load_job(&self, job_id: JobId) -> inference_core::Result<Job> {
        self.jobs
            .lock()
            .unwrap()
            .get(&job_id)
            .cloned()
            .ok_or_else(|| inference_core::CoreError::NotFound(job_id.to_string()))
    }

    async fn update_job(&self, job_id: JobId, patch: JobPatch) -> inference_core::Result<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| inference_core::CoreError::NotFound(job_id.to_string()))?;
        if let Some(status) = patch.status {
            job.status = status;
        }
        if let Some(started_at) = patch.started_at {
            job.started_at = Some(started_at);
        }
        if let Some(completed_at) = patch.completed_at {
            job.completed_at = Some(completed_at);
        }
        if let Some(retry_count) = patch.retry_count {
            job.retry_count = retry_count;
        }
        if let Some(result) = patch.result {
            job.result = Some(result);
        }
        if let Some(error_message) = patch.error_message {
            job.error_message = Some(error_message);
        }
        Ok(job.clone())
    }

    async fn within_transaction(
        &self,
        job: Job,
        _priority: i32,
    ) -> inference_core::Result<(Job, EntryId)> {
        self.jobs.lock().unwrap().insert(job.job_id, job.clone());
        Ok((job, EntryId::new()))
    }

    async fn commit_terminal(
        &self,
        job_id: JobId,
        patch: JobPatch,
        _entry_id: EntryId,
    ) -> inference_core::Result<Job> {
        // The HTTP contract tests never drive a job to execution, so this
        // never needs to actually touch a queue entry; reuse update_job's
        // patch-application logic for the job row itself.
        self.update_job(job_id, patch).await
    }

    async fn delete_job(&self, job_id: JobId) -> inference_core::Result<()> {
        self.jobs
            .lock()
            .unwrap()
            .remove(&job_id)
            .map(|_| ())
            .ok_or_else(|| inference_core::CoreError::NotFound(job_id.to_string()))
    }

    async fn find_active_by_media(
        &self,
        media_id: &str,
        task_type: TaskType,
    ) -> inference_core::Result<Option<Job>> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .values()
            .find(|j| j.media_id == media_id && j.task_type == task_type && !j.status.is_terminal())
            .cloned())
    }

    async fn count_by_status(&self, status: JobStatus) -> inference_core::Result<i64> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs.values().filter(|j| j.status == status).count() as i64)
    }

    async fn list_for_cleanup(
        &self,
        statuses: &[JobStatus],
        _older_than: Option<DateTime<Utc>>,
    ) -> inference_core::Result<Vec<JobId>> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .values()
            .filter(|j| statuses.contains(&j.status))
            .map(|j| j.job_id)
            .collect())
    }
}

#[derive(Default, Clone)]
struct FakeQueue;

#[async_trait]
impl PriorityQueue for FakeQueue {
    async fn enqueue(&self, _job_id: JobId, _priority: i32) -> inference_core::Result<EntryId> {
        Ok(EntryId::new())
    }

    async fn lease(
        &self,
        _worker_id: &str,
        _lease_duration: std::time::Duration,
    ) -> inference_core::Result<Option<LeasedEntry>> {
        Ok(None)
    }

    async fn renew(&self, _entry_id: EntryId, _extend_by: std::time::Duration) -> inference_core::Result<()> {
        Ok(())
    }

    async fn ack(&self, _entry_id: EntryId) -> inference_core::Result<()> {
        Ok(())
    }

    async fn nack(&self, _entry_id: EntryId, _visible_after: std::time::Duration) -> inference_core::Result<()> {
        Ok(())
    }

    async fn reap_expired(&self) -> inference_core::Result<u64> {
        Ok(0)
    }

    async fn snapshot(&self) -> inference_core::Result<QueueSnapshot> {
        Ok(QueueSnapshot {
            ready: 0,
            leased: 0,
            deferred: 0,
        })
    }
}

struct FakeMediaFetcher;

#[async_trait]
impl MediaFetcher for FakeMediaFetcher {
    async fn fetch(&self, _media_id: &str, _deadline: std::time::Duration) -> inference_core::Result<FetchedMedia> {
        unreachable!("the HTTP contract tests never drive a job to execution")
    }
}

struct FakeVectorSink;

#[async_trait]
impl VectorSink for FakeVectorSink {
    async fn upsert(&self, _collection: &str, _points: Vec<VectorPoint>) -> inference_core::Result<()> {
        Ok(())
    }
}

struct FakeInferenceEngine;

#[async_trait]
impl InferenceEngine for FakeInferenceEngine {
    async fn infer(&self, _task_type: TaskType, _image_bytes: Vec<u8>) -> inference_core::Result<JobResult> {
        unreachable!("the HTTP contract tests never drive a job to execution")
    }
}

struct FakeBroadcaster;

#[async_trait]
impl Broadcaster for FakeBroadcaster {
    async fn publish(&self, _job_id: JobId, _event_kind: EventKind, _payload: Value) {}
}

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
        worker: inference_core::config::WorkerTuning::default(),
    }
}

fn test_server() -> (TestServer, FakeStore) {
    let store = FakeStore::default();
    let runtime = Runtime {
        config: Arc::new(test_config()),
        store: Arc::new(store.clone()),
        queue: Arc::new(FakeQueue),
        media_fetcher: Arc::new(FakeMediaFetcher),
        vector_sink: Arc::new(FakeVectorSink),
        inference_engine: Arc::new(FakeInferenceEngine),
        broadcaster: Arc::new(FakeBroadcaster),
        auth_gate: Arc::new(JwtAuthGate::new(None, true).unwrap()),
    };
    let state = inference_server::wiring::app_state(runtime);
    let router = inference_server::routes::build_router(state);
    (TestServer::new(router).unwrap(), store)
}

#[tokio::test]
async fn health_is_public_and_reports_queue_size() {
    let (server, _store) = test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["queue_size"], 0);
}

#[tokio::test]
async fn submit_without_a_bearer_token_is_rejected() {
    let (server, _store) = test_server();
    let response = server
        .post("/job/by-type/image_embedding")
        .json(&serde_json::json!({"media_id": "m1"}))
        .await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submit_with_a_bearer_token_succeeds_under_auth_disabled() {
    let (server, _store) = test_server();
    let response = server
        .post("/job/by-type/image_embedding")
        .add_header(axum::http::header::AUTHORIZATION, "Bearer anything")
        .json(&serde_json::json!({"media_id": "m1", "priority": 6}))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let job: Job = response.json();
    assert_eq!(job.priority, 6);
    assert_eq!(job.status, JobStatus::Pending);
}

#[tokio::test]
async fn submit_rejects_an_unknown_task_type() {
    let (server, _store) = test_server();
    let response = server
        .post("/job/by-type/not_a_real_task")
        .add_header(axum::http::header::AUTHORIZATION, "Bearer anything")
        .json(&serde_json::json!({"media_id": "m1"}))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_job_round_trips_a_submitted_job() {
    let (server, _store) = test_server();
    let submitted = server
        .post("/job/by-type/face_detection")
        .add_header(axum::http::header::AUTHORIZATION, "Bearer anything")
        .json(&serde_json::json!({"media_id": "m2"}))
        .await
        .json::<Job>();

    let response = server.get(&format!("/job/{}", submitted.job_id)).await;
    response.assert_status_ok();
    let fetched: Job = response.json();
    assert_eq!(fetched.job_id, submitted.job_id);
}

#[tokio::test]
async fn get_job_for_an_unknown_id_is_not_found() {
    let (server, _store) = test_server();
    let response = server.get(&format!("/job/{}", JobId::new())).await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_require_the_admin_capability() {
    let (server, _store) = test_server();
    let response = server
        .get("/admin/stats")
        .add_header(axum::http::header::AUTHORIZATION, "Bearer anything")
        .await;
    // auth_disabled grants every capability including admin, so this succeeds.
    response.assert_status_ok();
}

#[tokio::test]
async fn admin_stats_without_a_token_is_rejected() {
    let (server, _store) = test_server();
    let response = server.get("/admin/stats").await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
}
