use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// The closed set of inference tasks the engine knows how to run. New
/// task types are added here, never inferred from caller-supplied strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ImageEmbedding,
    FaceDetection,
    FaceEmbedding,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::ImageEmbedding => "image_embedding",
            TaskType::FaceDetection => "face_detection",
            TaskType::FaceEmbedding => "face_embedding",
        }
    }

    /// Whether this task type produces vectors that must land in the
    /// vector store before the job can be marked complete.
    pub fn produces_vectors(&self) -> bool {
        match self {
            TaskType::ImageEmbedding | TaskType::FaceEmbedding => true,
            TaskType::FaceDetection => false,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image_embedding" => Ok(TaskType::ImageEmbedding),
            "face_detection" => Ok(TaskType::FaceDetection),
            "face_embedding" => Ok(TaskType::FaceEmbedding),
            other => Err(ModelError::InvalidTaskType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for t in [
            TaskType::ImageEmbedding,
            TaskType::FaceDetection,
            TaskType::FaceEmbedding,
        ] {
            assert_eq!(t.as_str().parse::<TaskType>().unwrap(), t);
        }
    }

    #[test]
    fn rejects_unknown_task() {
        assert!("video_embedding".parse::<TaskType>().is_err());
    }
}
