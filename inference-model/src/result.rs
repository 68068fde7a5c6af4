use serde::{Deserialize, Serialize};

/// Task-shaped inference output. Tagged so a caller can match on
/// `task_type` without guessing at a dynamically-shaped payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum JobResult {
    ImageEmbedding { dim: usize, vector: Vec<f32> },
    FaceDetection { faces: Vec<DetectedFace>, face_count: usize },
    FaceEmbedding { faces: Vec<DetectedFace>, face_count: usize },
}

impl JobResult {
    pub fn face_count(&self) -> Option<usize> {
        match self {
            JobResult::FaceDetection { face_count, .. }
            | JobResult::FaceEmbedding { face_count, .. } => Some(*face_count),
            JobResult::ImageEmbedding { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub face_index: u32,
    pub bbox: BoundingBox,
    pub landmarks: Vec<(f32, f32)>,
    pub confidence: f32,
    /// Present only for `face_embedding` jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_tag_and_content() {
        let result = JobResult::ImageEmbedding {
            dim: 2,
            vector: vec![0.1, 0.2],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "image_embedding");
        assert_eq!(json["payload"]["dim"], 2);
    }

    #[test]
    fn zero_faces_is_not_an_error() {
        let result = JobResult::FaceEmbedding {
            faces: vec![],
            face_count: 0,
        };
        assert_eq!(result.face_count(), Some(0));
    }
}
