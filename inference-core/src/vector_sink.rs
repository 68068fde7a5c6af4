use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CoreError, Result};

/// A point-id/vector/payload triple to be upserted into a named collection.
#[derive(Debug, Clone, Serialize)]
pub struct VectorPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: Value,
}

pub const IMAGE_EMBEDDINGS_COLLECTION: &str = "image_embeddings";
pub const FACE_EMBEDDINGS_COLLECTION: &str = "face_embeddings";

/// Larger than any realistic per-image face count; keeps `face_point_id`
/// collision-free within one `media_id`.
const FACE_INDEX_MULTIPLIER: u64 = 1_000;

/// Deterministic point id for a face embedding: collision-free across
/// faces of the same image, assuming fewer than `FACE_INDEX_MULTIPLIER`
/// faces per image.
pub fn face_point_id(media_id: u64, face_index: u32) -> u64 {
    media_id * FACE_INDEX_MULTIPLIER + face_index as u64
}

/// Durable vector storage. Upserts must be idempotent by `(collection, id)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorSink: Send + Sync {
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()>;
}

/// HTTP-backed implementation against a Qdrant-shaped vector-store API.
pub struct HttpVectorSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVectorSink {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpVectorSink {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl VectorSink for HttpVectorSink {
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/collections/{}/points?wait=true",
            self.base_url, collection
        );
        let body = serde_json::json!({ "points": points });

        let response = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::VectorSinkUnavailable(format!("upsert to {collection}: {e}")))?;

        if !response.status().is_success() {
            return Err(CoreError::VectorSinkUnavailable(format!(
                "vector store returned {} for {collection}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_point_ids_are_collision_free_within_one_image() {
        let media_id = 42;
        let a = face_point_id(media_id, 0);
        let b = face_point_id(media_id, 1);
        assert_ne!(a, b);
        assert_eq!(a, 42_000);
        assert_eq!(b, 42_001);
    }

    #[test]
    fn face_point_ids_differ_across_images() {
        assert_ne!(face_point_id(1, 5), face_point_id(2, 5));
    }
}
