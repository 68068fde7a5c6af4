use async_trait::async_trait;
use inference_model::JobId;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Terminal-state event kinds published by the Worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Completed,
    Failed,
}

impl EventKind {
    fn as_str(&self) -> &'static str {
        match self {
            EventKind::Completed => "completed",
            EventKind::Failed => "failed",
        }
    }
}

/// Publishes terminal-state events to a topic-based fan-out. Best-effort:
/// a publish failure must never revert or block the caller's already
/// committed job state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, job_id: JobId, event_kind: EventKind, payload: Value);
}

fn topic(job_id: JobId, event_kind: EventKind) -> String {
    format!("inference/job/{job_id}/{}", event_kind.as_str())
}

/// Redis pub/sub-backed `Broadcaster`. At-least-once delivery to the
/// broker; no acknowledgement or replay is implemented, matching the
/// best-effort contract; subscribers are expected to be idempotent.
#[derive(Clone)]
pub struct RedisBroadcaster {
    manager: ConnectionManager,
}

impl RedisBroadcaster {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = client.get_connection_manager().await?;
        Ok(RedisBroadcaster { manager })
    }
}

#[async_trait]
impl Broadcaster for RedisBroadcaster {
    async fn publish(&self, job_id: JobId, event_kind: EventKind, payload: Value) {
        let topic = topic(job_id, event_kind);
        let body = match serde_json::to_string(&payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(%job_id, "failed to serialize broadcast payload: {e}");
                return;
            }
        };

        let mut conn = self.manager.clone();
        if let Err(e) = conn.publish::<_, _, ()>(&topic, body).await {
            warn!(%job_id, %topic, "broadcast publish failed: {e}");
        }
    }
}

#[derive(Serialize)]
pub struct CompletedEventPayload<'a> {
    pub job_id: JobId,
    pub task_type: &'a str,
    pub status: &'static str,
    pub result_summary: Value,
    pub timestamp_ms: i64,
}

#[derive(Serialize)]
pub struct FailedEventPayload<'a> {
    pub job_id: JobId,
    pub status: &'static str,
    pub error_message: &'a str,
    pub retry_count: i32,
    pub timestamp_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_match_the_documented_convention() {
        let job_id = JobId::new();
        assert_eq!(
            topic(job_id, EventKind::Completed),
            format!("inference/job/{job_id}/completed")
        );
        assert_eq!(
            topic(job_id, EventKind::Failed),
            format!("inference/job/{job_id}/failed")
        );
    }
}
