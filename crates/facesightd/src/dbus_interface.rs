use std::sync::Arc;

use zbus::interface;

use facesight_core::matcher::Candidate;

use crate::engine::{EngineError, FaceEngine};
use crate::source::ImageSource;

/// D-Bus interface for the FaceSight recognition daemon.
///
/// Bus name: org.freedesktop.FaceSight1
/// Object path: /org/freedesktop/FaceSight1
///
/// Image arguments are references: local paths or http(s) URLs. Replies
/// are JSON strings.
pub struct FaceSightService {
    engine: Arc<FaceEngine>,
    source: ImageSource,
}

impl FaceSightService {
    pub fn new(engine: Arc<FaceEngine>, source: ImageSource) -> Self {
        Self { engine, source }
    }
}

#[interface(name = "org.freedesktop.FaceSight1")]
impl FaceSightService {
    /// Detect all faces in one image.
    async fn detect_photo(&self, reference: &str) -> zbus::fdo::Result<String> {
        tracing::info!(reference, "detect_photo requested");

        let image = self
            .source
            .fetch_and_decode(reference)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        let faces = self.engine.detect(image).await.map_err(to_dbus_error)?;

        Ok(serde_json::json!({
            "count": faces.len(),
            "faces": faces,
        })
        .to_string())
    }

    /// Detect faces across a batch of images. Per-item fetch failures
    /// degrade to an empty entry so one bad reference cannot sink the
    /// whole batch.
    async fn detect_batch(&self, references: Vec<String>) -> zbus::fdo::Result<String> {
        tracing::info!(count = references.len(), "detect_batch requested");

        let mut images = Vec::with_capacity(references.len());
        let mut skipped = vec![false; references.len()];

        for (idx, reference) in references.iter().enumerate() {
            match self.source.fetch_and_decode(reference).await {
                Ok(image) => images.push(image),
                Err(e) => {
                    tracing::warn!(reference, error = %e, "batch item unavailable, skipping");
                    skipped[idx] = true;
                }
            }
        }

        let detected = self
            .engine
            .detect_batch(images)
            .await
            .map_err(to_dbus_error)?;

        // Re-interleave skipped entries so the reply lines up with the
        // request order.
        let mut detected = detected.into_iter();
        let results: Vec<serde_json::Value> = skipped
            .into_iter()
            .map(|was_skipped| {
                if was_skipped {
                    serde_json::json!({ "count": 0, "faces": [] })
                } else {
                    let faces = detected.next().unwrap_or_default();
                    serde_json::json!({ "count": faces.len(), "faces": faces })
                }
            })
            .collect();

        Ok(serde_json::json!({ "results": results }).to_string())
    }

    /// Cosine similarity between the strongest face of each image.
    async fn compare_faces(&self, reference_a: &str, reference_b: &str) -> zbus::fdo::Result<String> {
        tracing::info!(reference_a, reference_b, "compare_faces requested");

        let image_a = self
            .source
            .fetch_and_decode(reference_a)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        let image_b = self
            .source
            .fetch_and_decode(reference_b)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        let similarity = self
            .engine
            .compare(image_a, image_b)
            .await
            .map_err(to_dbus_error)?;

        Ok(serde_json::json!({ "similarity": similarity }).to_string())
    }

    /// Rank stored candidates against the strongest face in the probe
    /// image. `candidates` is a JSON array of {id, embedding} objects.
    async fn match_face(&self, reference: &str, candidates: &str) -> zbus::fdo::Result<String> {
        tracing::info!(reference, "match_face requested");

        let candidates: Vec<Candidate> = serde_json::from_str(candidates)
            .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("candidates: {e}")))?;

        let image = self
            .source
            .fetch_and_decode(reference)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        let results = self
            .engine
            .match_face(image, &candidates)
            .await
            .map_err(to_dbus_error)?;

        Ok(serde_json::json!({ "matches": results }).to_string())
    }

    /// Model, backend, and capability description.
    async fn model_info(&self) -> zbus::fdo::Result<String> {
        Ok(self.engine.model_info().to_string())
    }

    /// Rolling processing statistics.
    async fn performance_stats(&self) -> zbus::fdo::Result<String> {
        Ok(self.engine.performance_stats().to_string())
    }

    /// Daemon status summary.
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "models_loaded": self.engine.is_loaded(),
        })
        .to_string())
    }
}

fn to_dbus_error(e: EngineError) -> zbus::fdo::Error {
    match e {
        EngineError::BatchTooLarge { .. } => zbus::fdo::Error::LimitsExceeded(e.to_string()),
        EngineError::ModelNotLoaded => zbus::fdo::Error::NotSupported(e.to_string()),
        _ => zbus::fdo::Error::Failed(e.to_string()),
    }
}
