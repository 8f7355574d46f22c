//! Model abstraction: the trait the pipeline drives, plus shared session
//! construction against a backend chain.

use std::path::Path;

use facesight_hw::{BackendDescriptor, BackendKind};
use image::RgbImage;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
    TensorRTExecutionProvider,
};
use ort::session::Session;
use serde::Serialize;
use thiserror::Error;

use crate::types::Gender;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file not found: {0} — download from insightface and place in models/")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// One face straight out of the model, in original-image float coordinates.
/// Size filtering and integer truncation happen downstream.
#[derive(Debug, Clone)]
pub struct RawFace {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub embedding: Vec<f32>,
    pub landmarks: Option<Vec<(f32, f32)>>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
}

/// What the loaded model actually provides, negotiated at load time.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ModelCapabilities {
    pub landmarks: bool,
    pub attributes: bool,
}

/// A loaded face model. `detect` runs the full per-image analysis and is
/// safe to call from several threads at once.
pub trait FaceModel: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<RawFace>, ModelError>;

    fn capabilities(&self) -> ModelCapabilities;

    /// Hint that per-request scratch allocations may be returned to the
    /// runtime. Best effort; the default does nothing.
    fn release_cached_memory(&self) {}
}

/// Build an ONNX session bound to the given backend chain. The chain order
/// is the registration order; the runtime falls through to later providers
/// when an earlier one cannot initialize.
pub(crate) fn commit_session(
    model_path: &Path,
    backends: &[BackendDescriptor],
) -> Result<Session, ModelError> {
    if !model_path.exists() {
        return Err(ModelError::ModelNotFound(
            model_path.display().to_string(),
        ));
    }

    let providers: Vec<ExecutionProviderDispatch> = backends
        .iter()
        .map(|b| match b.kind {
            BackendKind::TensorRt => TensorRTExecutionProvider::default()
                .with_device_id(b.device_id() as i32)
                .build(),
            BackendKind::Cuda => CUDAExecutionProvider::default()
                .with_device_id(b.device_id() as i32)
                .build(),
            BackendKind::Cpu => CPUExecutionProvider::default().build(),
        })
        .collect();

    let session = Session::builder()?
        .with_execution_providers(providers)?
        .with_intra_threads(2)?
        .commit_from_file(model_path)?;

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file_is_reported() {
        let err = commit_session(
            Path::new("/nonexistent/det_10g.onnx"),
            &[BackendDescriptor::cpu()],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::ModelNotFound(_)));
        assert!(err.to_string().contains("det_10g.onnx"));
    }

    #[test]
    fn test_capabilities_default_to_none() {
        let caps = ModelCapabilities::default();
        assert!(!caps.landmarks);
        assert!(!caps.attributes);
    }
}
