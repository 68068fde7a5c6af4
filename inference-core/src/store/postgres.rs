use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inference_model::{EntryId, Job, JobId, JobPatch, JobResult, JobStatus, TaskType};
use sqlx::PgPool;
use std::str::FromStr;
use tracing::info;

use crate::error::{CoreError, Result};
use crate::store::Store;

/// Postgres-backed `Store`. Every mutation that touches more than one row
/// (creating a job alongside its queue entry, for instance) is driven from
/// the caller side via explicit transactions; this type itself only
/// guarantees atomicity of its own single-row operations plus the
/// transition check baked into `update_job`.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects and verifies the migrations have been applied by probing
    /// for the jobs table.
    pub async fn new(pool: PgPool) -> Result<Self> {
        sqlx::query_scalar!("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| CoreError::Internal(format!("store failed Postgres health check: {e}")))?;

        let exists: Option<bool> = sqlx::query_scalar!(
            r#"SELECT EXISTS (
                SELECT 1 FROM information_schema.tables WHERE table_name = 'jobs'
            )"#
        )
        .fetch_one(&pool)
        .await
        .map_err(|e| CoreError::Internal(format!("store schema validation failed: {e}")))?;

        if exists != Some(true) {
            return Err(CoreError::Internal(
                "jobs table is missing; run migrations".into(),
            ));
        }

        info!("store connected to Postgres");
        Ok(PostgresStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_job(row: JobRow) -> Result<Job> {
        let task_type = TaskType::from_str(&row.task_type)
            .map_err(|e| CoreError::Internal(format!("corrupt task_type in store: {e}")))?;
        let status = status_from_str(&row.status)?;
        let result = match row.result {
            Some(value) => Some(serde_json::from_value::<JobResult>(value)?),
            None => None,
        };

        Ok(Job {
            job_id: JobId(row.job_id),
            task_type,
            media_id: row.media_id,
            status,
            priority: row.priority,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            error_message: row.error_message,
            result,
            created_by: row.created_by,
        })
    }
}

struct JobRow {
    job_id: uuid::Uuid,
    task_type: String,
    media_id: String,
    status: String,
    priority: i32,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    retry_count: i32,
    max_retries: i32,
    error_message: Option<String>,
    result: Option<serde_json::Value>,
    created_by: String,
}

fn status_from_str(s: &str) -> Result<JobStatus> {
    Ok(match s {
        "pending" => JobStatus::Pending,
        "processing" => JobStatus::Processing,
        "completed" => JobStatus::Completed,
        "error" => JobStatus::Error,
        "sync_failed" => JobStatus::SyncFailed,
        other => return Err(CoreError::Internal(format!("corrupt status in store: {other}"))),
    })
}

/// Locks the job row, validates the status transition, and writes the
/// patch, all within the caller's open transaction. Shared by `update_job`
/// and `commit_terminal` so both stay subject to the same transition check.
async fn apply_patch_locked(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    job_id: JobId,
    patch: JobPatch,
) -> Result<()> {
    let current = sqlx::query_as!(
        JobRow,
        r#"
        SELECT job_id, task_type, media_id, status, priority, created_at,
               started_at, completed_at, retry_count, max_retries,
               error_message, result, created_by
        FROM jobs WHERE job_id = $1
        FOR UPDATE
        "#,
        job_id.to_uuid()
    )
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(format!("update_job select failed: {e}")))?
    .ok_or_else(|| CoreError::NotFound(format!("job {job_id} not found")))?;

    let current_status = status_from_str(&current.status)?;
    let next_status = patch.status.unwrap_or(current_status);
    if next_status != current_status && !current_status.can_transition_to(next_status) {
        return Err(CoreError::Conflict(format!(
            "illegal transition {current_status} -> {next_status}"
        )));
    }

    let started_at = patch.started_at.or(current.started_at);
    let completed_at = patch.completed_at.or(current.completed_at);
    let retry_count = patch.retry_count.unwrap_or(current.retry_count);
    let error_message = patch.error_message.or(current.error_message);
    let result_json = match &patch.result {
        Some(r) => Some(serde_json::to_value(r)?),
        None => current.result.clone(),
    };

    sqlx::query!(
        r#"
        UPDATE jobs
        SET status = $2, started_at = $3, completed_at = $4,
            retry_count = $5, error_message = $6, result = $7
        WHERE job_id = $1
        "#,
        job_id.to_uuid(),
        next_status.to_string(),
        started_at,
        completed_at,
        retry_count,
        error_message,
        result_json,
    )
    .execute(&mut **tx)
    .await
    .map_err(|e| CoreError::Internal(format!("update_job update failed: {e}")))?;

    Ok(())
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_job(&self, job: Job) -> Result<Job> {
        let result_json = match &job.result {
            Some(r) => Some(serde_json::to_value(r)?),
            None => None,
        };

        let inserted = sqlx::query!(
            r#"
            INSERT INTO jobs (
                job_id, task_type, media_id, status, priority, created_at,
                started_at, completed_at, retry_count, max_retries,
                error_message, result, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
            job.job_id.to_uuid(),
            job.task_type.as_str(),
            job.media_id,
            job.status.to_string(),
            job.priority,
            job.created_at,
            job.started_at,
            job.completed_at,
            job.retry_count,
            job.max_retries,
            job.error_message,
            result_json,
            job.created_by,
        )
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(job),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                Err(CoreError::DuplicateJob)
            }
            Err(e) => Err(CoreError::Internal(format!("create_job failed: {e}"))),
        }
    }

    async fn within_transaction(&self, job: Job, priority: i32) -> Result<(Job, EntryId)> {
        let result_json = match &job.result {
            Some(r) => Some(serde_json::to_value(r)?),
            None => None,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::Internal(format!("begin within_transaction failed: {e}")))?;

        let inserted = sqlx::query!(
            r#"
            INSERT INTO jobs (
                job_id, task_type, media_id, status, priority, created_at,
                started_at, completed_at, retry_count, max_retries,
                error_message, result, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
            job.job_id.to_uuid(),
            job.task_type.as_str(),
            job.media_id,
            job.status.to_string(),
            job.priority,
            job.created_at,
            job.started_at,
            job.completed_at,
            job.retry_count,
            job.max_retries,
            job.error_message,
            result_json,
            job.created_by,
        )
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            return match e {
                sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                    Err(CoreError::DuplicateJob)
                }
                e => Err(CoreError::Internal(format!("within_transaction insert failed: {e}"))),
            };
        }

        let entry_id = EntryId::new();
        sqlx::query!(
            r#"
            INSERT INTO queue_entries (entry_id, job_id, priority, enqueued_at, visible_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            "#,
            entry_id.to_uuid(),
            job.job_id.to_uuid(),
            priority,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| CoreError::Internal(format!("within_transaction enqueue failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| CoreError::Internal(format!("within_transaction commit failed: {e}")))?;

        Ok((job, entry_id))
    }

    async fn load_job(&self, job_id: JobId) -> Result<Job> {
        let row = sqlx::query_as!(
            JobRow,
            r#"
            SELECT job_id, task_type, media_id, status, priority, created_at,
                   started_at, completed_at, retry_count, max_retries,
                   error_message, result, created_by
            FROM jobs WHERE job_id = $1
            "#,
            job_id.to_uuid()
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::Internal(format!("load_job failed: {e}")))?
        .ok_or_else(|| CoreError::NotFound(format!("job {job_id} not found")))?;

        Self::row_to_job(row)
    }

    async fn update_job(&self, job_id: JobId, patch: JobPatch) -> Result<Job> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::Internal(format!("begin update_job tx failed: {e}")))?;

        apply_patch_locked(&mut tx, job_id, patch).await?;

        tx.commit()
            .await
            .map_err(|e| CoreError::Internal(format!("update_job commit failed: {e}")))?;

        self.load_job(job_id).await
    }

    async fn commit_terminal(
        &self,
        job_id: JobId,
        patch: JobPatch,
        entry_id: EntryId,
    ) -> Result<Job> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::Internal(format!("begin commit_terminal tx failed: {e}")))?;

        apply_patch_locked(&mut tx, job_id, patch).await?;

        sqlx::query!(
            "DELETE FROM queue_entries WHERE entry_id = $1",
            entry_id.to_uuid(),
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| CoreError::Internal(format!("commit_terminal ack failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| CoreError::Internal(format!("commit_terminal commit failed: {e}")))?;

        self.load_job(job_id).await
    }

    async fn delete_job(&self, job_id: JobId) -> Result<()> {
        let result = sqlx::query!("DELETE FROM jobs WHERE job_id = $1", job_id.to_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::Internal(format!("delete_job failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("job {job_id} not found")));
        }
        Ok(())
    }

    async fn find_active_by_media(
        &self,
        media_id: &str,
        task_type: TaskType,
    ) -> Result<Option<Job>> {
        let row = sqlx::query_as!(
            JobRow,
            r#"
            SELECT job_id, task_type, media_id, status, priority, created_at,
                   started_at, completed_at, retry_count, max_retries,
                   error_message, result, created_by
            FROM jobs WHERE media_id = $1 AND task_type = $2
            "#,
            media_id,
            task_type.as_str()
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::Internal(format!("find_active_by_media failed: {e}")))?;

        row.map(Self::row_to_job).transpose()
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count = sqlx::query_scalar!(
            "SELECT COUNT(*) FROM jobs WHERE status = $1",
            status.to_string()
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CoreError::Internal(format!("count_by_status failed: {e}")))?;

        Ok(count.unwrap_or(0))
    }

    async fn list_for_cleanup(
        &self,
        statuses: &[JobStatus],
        older_than: Option<DateTime<Utc>>,
    ) -> Result<Vec<JobId>> {
        let status_strs: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
        let rows = sqlx::query_scalar!(
            r#"
            SELECT job_id FROM jobs
            WHERE status = ANY($1)
              AND ($2::timestamptz IS NULL OR created_at < $2)
            "#,
            &status_strs,
            older_than
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::Internal(format!("list_for_cleanup failed: {e}")))?;

        Ok(rows.into_iter().map(JobId).collect())
    }
}
