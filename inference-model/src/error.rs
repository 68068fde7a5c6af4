use thiserror::Error;

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid task type: {0}")]
    InvalidTaskType(String),

    #[error("priority {0} is out of range [0, 10]")]
    InvalidPriority(i32),

    #[error("invalid media id: {0}")]
    InvalidMediaId(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
