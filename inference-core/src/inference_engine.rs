use async_trait::async_trait;
use image::{GenericImageView, imageops::FilterType};
use inference_model::{BoundingBox, DetectedFace, JobResult, TaskType};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

/// Opaque `(task_type, image) -> structured result` computational
/// capability. Model loading, hardware affinity, and GPU memory management
/// live behind this trait, not in the Worker loop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    async fn infer(&self, task_type: TaskType, image_bytes: Vec<u8>) -> Result<JobResult>;
}

const EMBEDDING_DIM: usize = 64;

/// A local, CPU-only engine: deterministic, content-addressed feature
/// vectors derived from decoded pixel data and a simple luminance-gradient
/// face detector. Stands in for a real model backend while exercising the
/// same dispatch, error-classification, and result shapes a GPU-backed
/// engine would need to honour.
pub struct LocalInferenceEngine;

impl LocalInferenceEngine {
    pub fn new() -> Self {
        LocalInferenceEngine
    }
}

impl Default for LocalInferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceEngine for LocalInferenceEngine {
    async fn infer(&self, task_type: TaskType, image_bytes: Vec<u8>) -> Result<JobResult> {
        tokio::task::spawn_blocking(move || run_inference(task_type, &image_bytes))
            .await
            .map_err(|e| CoreError::ModelTransient(format!("inference task panicked: {e}")))?
    }
}

fn run_inference(task_type: TaskType, image_bytes: &[u8]) -> Result<JobResult> {
    let img = image::load_from_memory(image_bytes)
        .map_err(|e| CoreError::MalformedImage(e.to_string()))?;

    match task_type {
        TaskType::ImageEmbedding => Ok(JobResult::ImageEmbedding {
            dim: EMBEDDING_DIM,
            vector: embed_image(&img),
        }),
        TaskType::FaceDetection => {
            let faces = detect_faces(&img, false);
            Ok(JobResult::FaceDetection {
                face_count: faces.len(),
                faces,
            })
        }
        TaskType::FaceEmbedding => {
            let faces = detect_faces(&img, true);
            Ok(JobResult::FaceEmbedding {
                face_count: faces.len(),
                faces,
            })
        }
    }
}

/// Resizes to a fixed thumbnail, hashes the pixel buffer, and expands the
/// digest into a unit-norm float vector. Deterministic for identical input
/// bytes, which is what the vector-store idempotence tests rely on.
fn embed_image(img: &image::DynamicImage) -> Vec<f32> {
    let small = img.resize_exact(16, 16, FilterType::Triangle).to_rgb8();
    let digest = Sha256::digest(small.as_raw());

    let mut vector: Vec<f32> = digest
        .iter()
        .cycle()
        .take(EMBEDDING_DIM)
        .map(|b| (*b as f32 / 255.0) * 2.0 - 1.0)
        .collect();

    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Grid-based luminance-variance heuristic: any cell whose local contrast
/// exceeds the threshold is reported as a candidate face. Not a real
/// detector, but exercises the bbox/landmark/confidence shape faithfully.
fn detect_faces(img: &image::DynamicImage, with_embedding: bool) -> Vec<DetectedFace> {
    let (width, height) = img.dimensions();
    if width < 32 || height < 32 {
        return Vec::new();
    }

    let gray = img.to_luma8();
    let grid = 4u32;
    let cell_w = width / grid;
    let cell_h = height / grid;

    let mut faces = Vec::new();
    let mut face_index = 0u32;

    for row in 0..grid {
        for col in 0..grid {
            let x0 = col * cell_w;
            let y0 = row * cell_h;
            let mut sum = 0u64;
            let mut sum_sq = 0u64;
            let mut n = 0u64;
            for y in y0..(y0 + cell_h).min(height) {
                for x in x0..(x0 + cell_w).min(width) {
                    let v = gray.get_pixel(x, y).0[0] as u64;
                    sum += v;
                    sum_sq += v * v;
                    n += 1;
                }
            }
            if n == 0 {
                continue;
            }
            let mean = sum as f64 / n as f64;
            let variance = (sum_sq as f64 / n as f64) - mean * mean;
            let stddev = variance.max(0.0).sqrt();

            if stddev > 40.0 {
                let confidence = (stddev / 128.0).clamp(0.0, 1.0) as f32;
                let bbox = BoundingBox {
                    x: x0 as f32,
                    y: y0 as f32,
                    w: cell_w as f32,
                    h: cell_h as f32,
                };
                let vector = with_embedding.then(|| {
                    embed_image(&img.crop_imm(x0, y0, cell_w.max(1), cell_h.max(1)))
                });
                faces.push(DetectedFace {
                    face_index,
                    landmarks: five_point_landmarks(&bbox),
                    bbox,
                    confidence,
                    vector,
                });
                face_index += 1;
            }
        }
    }
    faces
}

/// Standard 5-point layout (eyes, nose tip, mouth corners) placed at fixed
/// fractions of the bounding box, matching the shape a real landmark model
/// would report even though this detector never looks past the box.
fn five_point_landmarks(bbox: &BoundingBox) -> Vec<(f32, f32)> {
    const FRACTIONS: [(f32, f32); 5] = [
        (0.30, 0.35),
        (0.70, 0.35),
        (0.50, 0.55),
        (0.35, 0.75),
        (0.65, 0.75),
    ];
    FRACTIONS
        .iter()
        .map(|(fx, fy)| (bbox.x + fx * bbox.w, bbox.y + fy * bbox.h))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([128, 64, 200]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn image_embedding_is_deterministic() {
        let engine = LocalInferenceEngine::new();
        let bytes = solid_png(64, 64);
        let a = engine
            .infer(TaskType::ImageEmbedding, bytes.clone())
            .await
            .unwrap();
        let b = engine.infer(TaskType::ImageEmbedding, bytes).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn malformed_image_is_non_retryable() {
        let engine = LocalInferenceEngine::new();
        let err = engine
            .infer(TaskType::ImageEmbedding, vec![0, 1, 2, 3])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MalformedImage(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn zero_faces_in_a_blank_image_is_not_an_error() {
        let engine = LocalInferenceEngine::new();
        let bytes = solid_png(64, 64);
        let result = engine.infer(TaskType::FaceEmbedding, bytes).await.unwrap();
        assert_eq!(result.face_count(), Some(0));
    }
}
