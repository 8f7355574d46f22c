//! facesight-core — Face detection, embedding, and matching engine.
//!
//! SCRFD detection and ArcFace embeddings via ONNX Runtime, with
//! accelerator-aware session initialization, CPU fallback, backend-aware
//! image normalization, and cosine-similarity ranking.

use std::path::PathBuf;

pub mod alignment;
pub mod analyzer;
pub mod attributes;
pub mod detector;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod recognizer;
pub mod session;
pub mod stats;
pub mod types;

pub use matcher::{rank, strongest_face, Candidate, MatchError};
pub use model::{FaceModel, ModelCapabilities, ModelError, RawFace};
pub use pipeline::DetectionPipeline;
pub use session::{InitError, ModelSession, SessionOptions, SessionState};
pub use stats::{AcceleratorMemory, ProcessingStats};
pub use types::{BoundingBox, Embedding, FaceRecord, Gender, MatchResult, EMBEDDING_DIM};

/// Default directory for ONNX model files: `$XDG_DATA_HOME/facesight/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facesight/models")
}
