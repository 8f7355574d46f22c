//! Engine: one initialized pipeline plus the concurrency gate in front of
//! it. All inference runs on the blocking pool with a semaphore permit
//! held, so at most `max_workers` requests touch the model at once.

use std::sync::Arc;

use image::RgbImage;
use thiserror::Error;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;

use facesight_core::analyzer::MODEL_NAME;
use facesight_core::matcher::{self, Candidate};
use facesight_core::session::{InitError, ModelSession, SessionOptions};
use facesight_core::stats::AcceleratorMemory;
use facesight_core::{DetectionPipeline, FaceRecord, MatchError, MatchResult, ProcessingStats};
use facesight_hw::CapabilitySnapshot;

use crate::config::Config;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model is not loaded")]
    ModelNotLoaded,
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("batch of {len} exceeds the limit of {max}")]
    BatchTooLarge { len: usize, max: usize },
    #[error("no face found in image")]
    NoFace,
    #[error("inference worker failed")]
    Worker,
}

struct Ready {
    pipeline: Arc<DetectionPipeline>,
    gate: Arc<Semaphore>,
    max_workers: usize,
    max_batch: usize,
    parallel: bool,
}

pub struct FaceEngine {
    config: Config,
    capability: CapabilitySnapshot,
    ready: OnceCell<Ready>,
}

impl FaceEngine {
    pub fn new(config: Config, capability: CapabilitySnapshot) -> Self {
        Self {
            config,
            capability,
            ready: OnceCell::new(),
        }
    }

    /// Load the model and size the gate. Idempotent; concurrent callers
    /// share one initialization.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        self.ready
            .get_or_try_init(|| async {
                let options = SessionOptions {
                    model_dir: self.config.model_dir.clone(),
                    force_cpu: self.config.force_cpu,
                    device_id: self.config.device_id,
                };
                let snapshot = self.capability.clone();

                let session =
                    tokio::task::spawn_blocking(move || ModelSession::initialize(&snapshot, &options))
                        .await
                        .map_err(|_| EngineError::Worker)??;

                let accelerated = session.state().accelerated;
                let accelerator_memory = accelerated.then(|| AcceleratorMemory {
                    device_count: self.capability.device_count,
                    total_bytes: self.capability.memory_bytes,
                });

                let pipeline = Arc::new(DetectionPipeline::new(
                    session,
                    self.config.min_face_size,
                    self.config.memory_optimization,
                    accelerator_memory,
                ));

                let max_workers = self.config.effective_max_workers(accelerated);
                let max_batch = self.config.effective_max_batch(accelerated);
                let parallel = self.config.parallel_processing && accelerated;

                tracing::info!(
                    device = %pipeline.state().device_label,
                    max_workers,
                    max_batch,
                    parallel,
                    "engine ready"
                );

                Ok(Ready {
                    pipeline,
                    gate: Arc::new(Semaphore::new(max_workers)),
                    max_workers,
                    max_batch,
                    parallel,
                })
            })
            .await
            .map(|_| ())
    }

    /// Analyze one image under the concurrency gate.
    pub async fn detect(&self, image: RgbImage) -> Result<Vec<FaceRecord>, EngineError> {
        let ready = self.ready.get().ok_or(EngineError::ModelNotLoaded)?;

        let permit = ready
            .gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::Worker)?;
        let pipeline = ready.pipeline.clone();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            pipeline.detect(image)
        })
        .await
        .map_err(|_| EngineError::Worker)
    }

    /// Analyze a batch, preserving input order. Accelerated sessions fan
    /// items out across the gate; CPU sessions run them one at a time.
    pub async fn detect_batch(
        &self,
        images: Vec<RgbImage>,
    ) -> Result<Vec<Vec<FaceRecord>>, EngineError> {
        let ready = self.ready.get().ok_or(EngineError::ModelNotLoaded)?;

        if images.len() > ready.max_batch {
            return Err(EngineError::BatchTooLarge {
                len: images.len(),
                max: ready.max_batch,
            });
        }

        if !ready.parallel {
            let mut results = Vec::with_capacity(images.len());
            for image in images {
                results.push(self.detect(image).await?);
            }
            return Ok(results);
        }

        let count = images.len();
        let mut set = JoinSet::new();
        for (idx, image) in images.into_iter().enumerate() {
            let gate = ready.gate.clone();
            let pipeline = ready.pipeline.clone();
            set.spawn(async move {
                let Ok(permit) = gate.acquire_owned().await else {
                    return (idx, Vec::new());
                };
                let result = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    pipeline.detect(image)
                })
                .await;
                (idx, result.unwrap_or_default())
            });
        }

        let mut results = vec![Vec::new(); count];
        while let Some(joined) = set.join_next().await {
            let (idx, faces) = joined.map_err(|_| EngineError::Worker)?;
            results[idx] = faces;
        }
        Ok(results)
    }

    /// Similarity between the strongest face of each image.
    pub async fn compare(&self, a: RgbImage, b: RgbImage) -> Result<f32, EngineError> {
        let faces_a = self.detect(a).await?;
        let faces_b = self.detect(b).await?;

        let probe_a = matcher::strongest_face(&faces_a).ok_or(EngineError::NoFace)?;
        let probe_b = matcher::strongest_face(&faces_b).ok_or(EngineError::NoFace)?;

        Ok(probe_a.embedding.similarity(&probe_b.embedding))
    }

    /// Rank stored candidates against the strongest face of the probe
    /// image, best first.
    pub async fn match_face(
        &self,
        probe: RgbImage,
        candidates: &[Candidate],
    ) -> Result<Vec<MatchResult>, EngineError> {
        let faces = self.detect(probe).await?;
        let strongest = matcher::strongest_face(&faces).ok_or(EngineError::NoFace)?;
        Ok(matcher::rank(&strongest.embedding, candidates)?)
    }

    /// Model and session description for the info surface.
    pub fn model_info(&self) -> serde_json::Value {
        let accelerator = serde_json::json!({
            "available": self.capability.accelerator_available,
            "kind": self.capability.accelerator_kind,
            "device_count": self.capability.device_count,
        });

        match self.ready.get() {
            Some(ready) => {
                let state = ready.pipeline.state();
                serde_json::json!({
                    "model": MODEL_NAME,
                    "embedding_dimension": facesight_core::EMBEDDING_DIM,
                    "loaded": state.loaded,
                    "device": state.device_label,
                    "provider": state.backend.kind.provider_name(),
                    "tuning": state.backend.tuning,
                    "detection_size": state.detection_size,
                    "fallback": state.fallback,
                    "capabilities": ready.pipeline.capabilities(),
                    "max_workers": ready.max_workers,
                    "max_batch_size": ready.max_batch,
                    "accelerator": accelerator,
                })
            }
            None => serde_json::json!({
                "model": MODEL_NAME,
                "embedding_dimension": facesight_core::EMBEDDING_DIM,
                "loaded": false,
                "accelerator": accelerator,
            }),
        }
    }

    /// Rolling stats plus the derived throughput figure.
    pub fn performance_stats(&self) -> serde_json::Value {
        let (stats, device) = match self.ready.get() {
            Some(ready) => (
                ready.pipeline.stats(),
                ready.pipeline.state().device_label.clone(),
            ),
            None => (ProcessingStats::default(), "none".to_string()),
        };

        serde_json::json!({
            "total_processed": stats.total_processed,
            "total_faces_detected": stats.total_faces_detected,
            "average_processing_time": stats.average_processing_time,
            "faces_per_second": stats.faces_per_second(),
            "accelerator_memory": stats.accelerator_memory,
            "device": device,
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.ready.get().is_some()
    }

    #[cfg(test)]
    fn with_ready(config: Config, capability: CapabilitySnapshot, ready: Ready) -> Self {
        let cell = OnceCell::new();
        cell.set(ready).ok();
        Self {
            config,
            capability,
            ready: cell,
        }
    }
}
