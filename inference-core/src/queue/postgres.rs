use async_trait::async_trait;
use inference_model::{EntryId, JobId, QueueEntry, QueueSnapshot};
use sqlx::PgPool;
use std::time::Duration;
use tracing::warn;

use crate::error::{CoreError, Result};
use crate::queue::{LeasedEntry, PriorityQueue};

/// Postgres-backed `PriorityQueue`. Selection is strict priority-then-FIFO
/// over unleased, currently-visible entries, using `FOR UPDATE SKIP LOCKED`
/// so concurrent workers never contend on the same candidate row.
#[derive(Clone)]
pub struct PostgresPriorityQueue {
    pool: PgPool,
}

impl PostgresPriorityQueue {
    pub fn new(pool: PgPool) -> Self {
        PostgresPriorityQueue { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PriorityQueue for PostgresPriorityQueue {
    async fn enqueue(&self, job_id: JobId, priority: i32) -> Result<EntryId> {
        let entry = QueueEntry::new(job_id, priority);
        sqlx::query!(
            r#"
            INSERT INTO queue_entries (entry_id, job_id, priority, enqueued_at, visible_at)
            VALUES ($1, $2, $3, $4, $4)
            "#,
            entry.entry_id.to_uuid(),
            entry.job_id.to_uuid(),
            entry.priority,
            entry.enqueued_at,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::Internal(format!("enqueue failed: {e}")))?;

        Ok(entry.entry_id)
    }

    async fn lease(
        &self,
        worker_id: &str,
        lease_duration: Duration,
    ) -> Result<Option<LeasedEntry>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::Internal(format!("begin lease tx failed: {e}")))?;

        let candidate = sqlx::query!(
            r#"
            SELECT entry_id, job_id
            FROM queue_entries
            WHERE leased_until IS NULL
              AND visible_at <= NOW()
            ORDER BY priority DESC, enqueued_at ASC
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#
        )
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CoreError::Internal(format!("lease select failed: {e}")))?;

        let Some(candidate) = candidate else {
            return Ok(None);
        };

        let lease_ms = lease_duration.as_millis() as i64;
        let updated = sqlx::query!(
            r#"
            UPDATE queue_entries
            SET lease_holder = $2,
                leased_until = NOW() + ($3::bigint) * INTERVAL '1 millisecond'
            WHERE entry_id = $1 AND leased_until IS NULL
            "#,
            candidate.entry_id,
            worker_id,
            lease_ms,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| CoreError::Internal(format!("lease update failed: {e}")))?;

        if updated.rows_affected() == 0 {
            // Raced with another worker's lease/ack between select and update.
            return Ok(None);
        }

        tx.commit()
            .await
            .map_err(|e| CoreError::Internal(format!("lease commit failed: {e}")))?;

        Ok(Some(LeasedEntry {
            entry_id: EntryId(candidate.entry_id),
            job_id: JobId(candidate.job_id),
        }))
    }

    async fn renew(&self, entry_id: EntryId, extend_by: Duration) -> Result<()> {
        let extend_ms = extend_by.as_millis() as i64;
        let updated = sqlx::query!(
            r#"
            UPDATE queue_entries
            SET leased_until = leased_until + ($2::bigint) * INTERVAL '1 millisecond'
            WHERE entry_id = $1 AND leased_until > NOW()
            "#,
            entry_id.to_uuid(),
            extend_ms,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::Internal(format!("renew failed: {e}")))?;

        if updated.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!(
                "lease for entry {entry_id} not found or expired"
            )));
        }
        Ok(())
    }

    async fn ack(&self, entry_id: EntryId) -> Result<()> {
        sqlx::query!(
            "DELETE FROM queue_entries WHERE entry_id = $1",
            entry_id.to_uuid()
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::Internal(format!("ack failed: {e}")))?;
        Ok(())
    }

    async fn nack(&self, entry_id: EntryId, visible_after: Duration) -> Result<()> {
        let delay_ms = visible_after.as_millis() as i64;
        sqlx::query!(
            r#"
            UPDATE queue_entries
            SET lease_holder = NULL,
                leased_until = NULL,
                visible_at = NOW() + ($2::bigint) * INTERVAL '1 millisecond'
            WHERE entry_id = $1
            "#,
            entry_id.to_uuid(),
            delay_ms,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::Internal(format!("nack failed: {e}")))?;
        Ok(())
    }

    async fn reap_expired(&self) -> Result<u64> {
        let expired = sqlx::query!(
            r#"
            UPDATE queue_entries
            SET lease_holder = NULL, leased_until = NULL
            WHERE leased_until IS NOT NULL AND leased_until < NOW()
            RETURNING entry_id
            "#
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::Internal(format!("reap_expired failed: {e}")))?;

        if !expired.is_empty() {
            warn!(count = expired.len(), "reaped expired queue leases");
        }
        Ok(expired.len() as u64)
    }

    async fn snapshot(&self) -> Result<QueueSnapshot> {
        let row = sqlx::query!(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE leased_until IS NULL AND visible_at <= NOW()) AS "ready!",
                COUNT(*) FILTER (WHERE leased_until IS NOT NULL AND leased_until > NOW()) AS "leased!",
                COUNT(*) FILTER (WHERE leased_until IS NULL AND visible_at > NOW()) AS "deferred!"
            FROM queue_entries
            "#
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CoreError::Internal(format!("snapshot failed: {e}")))?;

        Ok(QueueSnapshot {
            ready: row.ready,
            leased: row.leased,
            deferred: row.deferred,
        })
    }
}
