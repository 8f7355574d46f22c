//! The per-image detection pipeline: normalize, run the model, filter
//! undersized faces, and fold timing into the rolling stats.

use std::sync::Mutex;
use std::time::Instant;

use image::RgbImage;

use crate::model::ModelCapabilities;
use crate::normalize;
use crate::session::{ModelSession, SessionState};
use crate::stats::{AcceleratorMemory, ProcessingStats};
use crate::types::{BoundingBox, Embedding, FaceRecord};

/// Faces with a side shorter than this (pixels, post-normalization
/// coordinates) are dropped.
pub const DEFAULT_MIN_FACE_SIZE: i32 = 50;

pub struct DetectionPipeline {
    session: ModelSession,
    min_face_size: i32,
    memory_optimization: bool,
    stats: Mutex<ProcessingStats>,
}

impl DetectionPipeline {
    pub fn new(
        session: ModelSession,
        min_face_size: i32,
        memory_optimization: bool,
        accelerator_memory: Option<AcceleratorMemory>,
    ) -> Self {
        let stats = ProcessingStats {
            accelerator_memory,
            ..ProcessingStats::default()
        };
        Self {
            session,
            min_face_size,
            memory_optimization,
            stats: Mutex::new(stats),
        }
    }

    /// Analyze one image. Best effort: a model failure logs and yields an
    /// empty result rather than an error, and leaves the stats untouched.
    pub fn detect(&self, image: RgbImage) -> Vec<FaceRecord> {
        let started = Instant::now();
        let accelerated = self.session.state().accelerated;

        let normalized = normalize::normalize(image, accelerated);

        let raw = match self.session.model().detect(&normalized) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = %e, "face analysis failed");
                return Vec::new();
            }
        };

        let mut faces = Vec::with_capacity(raw.len());
        for face in raw {
            // Truncate toward zero, matching the detector's integer
            // contract downstream.
            let x = face.x1 as i32;
            let y = face.y1 as i32;
            let width = face.x2 as i32 - x;
            let height = face.y2 as i32 - y;

            if width < self.min_face_size || height < self.min_face_size {
                tracing::debug!(width, height, min = self.min_face_size, "dropped undersized face");
                continue;
            }

            faces.push(FaceRecord {
                bbox: BoundingBox { x, y, width, height },
                confidence: face.score,
                embedding: Embedding::new(face.embedding),
                landmarks: face.landmarks,
                age: face.age,
                gender: face.gender,
            });
        }

        let elapsed = started.elapsed().as_secs_f64();
        {
            let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
            stats.record(elapsed, faces.len() as u64);
        }

        if accelerated && self.memory_optimization {
            self.session.model().release_cached_memory();
        }

        faces
    }

    /// Snapshot of the rolling stats.
    pub fn stats(&self) -> ProcessingStats {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        self.session.model().capabilities()
    }
}
