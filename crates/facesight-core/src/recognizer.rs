//! ArcFace face recognizer via ONNX Runtime.
//!
//! Extracts 512-dimensional face embeddings from aligned face crops,
//! using the w600k_r50 ArcFace model.

use std::path::Path;
use std::sync::Mutex;

use facesight_hw::BackendDescriptor;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

use crate::model::{commit_session, ModelError};
use crate::types::{Embedding, EMBEDDING_DIM};

const ARCFACE_INPUT_SIZE: usize = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // NOT 128.0 — ArcFace uses symmetric normalization

/// ArcFace-based face recognizer.
pub struct FaceRecognizer {
    session: Mutex<Session>,
}

impl FaceRecognizer {
    /// Load the ArcFace ONNX model against the given backend chain.
    pub fn load(model_path: &Path, backends: &[BackendDescriptor]) -> Result<Self, ModelError> {
        let session = commit_session(model_path, backends)?;

        tracing::info!(
            path = %model_path.display(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self {
            session: Mutex::new(session),
        })
    }

    /// Extract an L2-normalized embedding from a pre-aligned 112×112 crop.
    pub fn extract(&self, aligned: &RgbImage) -> Result<Embedding, ModelError> {
        let input = Self::preprocess(aligned);

        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();

        if raw.len() != EMBEDDING_DIM {
            return Err(ModelError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|x| x / norm).collect()
        } else {
            raw
        };

        Ok(Embedding::new(values))
    }

    /// Preprocess a 112×112 aligned RGB crop into a NCHW float tensor.
    /// Crops of any other size sample out of bounds as black.
    fn preprocess(aligned: &RgbImage) -> Array4<f32> {
        let size = ARCFACE_INPUT_SIZE;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for y in 0..size {
            for x in 0..size {
                let pixel = if x < aligned.width() as usize && y < aligned.height() as usize {
                    *aligned.get_pixel(x as u32, y as u32)
                } else {
                    image::Rgb([0, 0, 0])
                };

                for c in 0..3 {
                    tensor[[0, c, y, x]] = (pixel[c] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
                }
            }
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_output_shape() {
        let aligned = RgbImage::from_pixel(112, 112, image::Rgb([128, 128, 128]));
        let tensor = FaceRecognizer::preprocess(&aligned);
        assert_eq!(tensor.shape(), &[1, 3, ARCFACE_INPUT_SIZE, ARCFACE_INPUT_SIZE]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let aligned = RgbImage::from_pixel(112, 112, image::Rgb([128, 128, 128]));
        let tensor = FaceRecognizer::preprocess(&aligned);
        // 128 - 127.5 = 0.5, / 127.5 ≈ 0.00392
        let val = tensor[[0, 0, 0, 0]];
        let expected = (128.0 - ARCFACE_MEAN) / ARCFACE_STD;
        assert!((val - expected).abs() < 1e-6, "got {val}, expected {expected}");
    }

    #[test]
    fn test_preprocess_channel_order() {
        let aligned = RgbImage::from_pixel(112, 112, image::Rgb([255, 128, 0]));
        let tensor = FaceRecognizer::preprocess(&aligned);
        assert!(tensor[[0, 0, 5, 5]] > 0.99);
        assert!(tensor[[0, 1, 5, 5]].abs() < 0.01);
        assert!((tensor[[0, 2, 5, 5]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_undersized_crop_pads_black() {
        let aligned = RgbImage::from_pixel(50, 50, image::Rgb([255, 255, 255]));
        let tensor = FaceRecognizer::preprocess(&aligned);
        // Inside the crop: bright. Outside: black → -1.0.
        assert!(tensor[[0, 0, 10, 10]] > 0.99);
        assert!((tensor[[0, 0, 100, 100]] + 1.0).abs() < 1e-6);
    }
}
