use thiserror::Error;

/// Taxonomy of failures the core can produce. Every variant here maps to a
/// transport status in `inference-server::errors` and to a retry policy in
/// `worker`; adding a variant means updating both.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate job for this media_id and task_type")]
    DuplicateJob,

    #[error("illegal state transition: {0}")]
    Conflict(String),

    #[error("media not found: {0}")]
    MediaMissing(String),

    #[error("media store unavailable: {0}")]
    MediaUnavailable(String),

    #[error("malformed image: {0}")]
    MalformedImage(String),

    #[error("model transiently unavailable: {0}")]
    ModelTransient(String),

    #[error("vector store unavailable: {0}")]
    VectorSinkUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether a Worker should soft-retry this failure (subject to
    /// `retry_count < max_retries`) or transition the job straight to
    /// `error`.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::MediaUnavailable(_)
                | CoreError::ModelTransient(_)
                | CoreError::VectorSinkUnavailable(_)
        )
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CoreError::NotFound("row not found".into()),
            other => CoreError::Internal(format!("database error: {other}")),
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::MediaUnavailable(format!("http error: {err}"))
    }
}

impl From<redis::RedisError> for CoreError {
    fn from(err: redis::RedisError) -> Self {
        CoreError::Internal(format!("redis error: {err}"))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal(format!("serialization error: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// True when a raw sqlx error is a Postgres unique_violation (`23505`).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}
