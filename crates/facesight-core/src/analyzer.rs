//! The buffalo_l model pack: SCRFD detection, ArcFace embeddings, and the
//! optional genderage attribute head, wired up behind [`FaceModel`].

use std::path::Path;

use image::RgbImage;

use facesight_hw::BackendDescriptor;

use crate::alignment;
use crate::attributes::AttributeAnalyzer;
use crate::detector::FaceDetector;
use crate::model::{FaceModel, ModelCapabilities, ModelError, RawFace};
use crate::recognizer::FaceRecognizer;

pub const MODEL_NAME: &str = "buffalo_l";

const DETECTOR_FILE: &str = "det_10g.onnx";
const RECOGNIZER_FILE: &str = "w600k_r50.onnx";
const ATTRIBUTES_FILE: &str = "genderage.onnx";

/// Full analysis stack for one loaded model pack.
pub struct FaceAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    attributes: Option<AttributeAnalyzer>,
    capabilities: ModelCapabilities,
}

impl FaceAnalyzer {
    /// Load the pack from `model_dir` against the given backend chain.
    ///
    /// Detector and recognizer are required; the attribute head is loaded
    /// when its file is present and skipped (with a log line) otherwise.
    pub fn load(
        model_dir: &Path,
        backends: &[BackendDescriptor],
        detection_size: usize,
    ) -> Result<Self, ModelError> {
        let detector = FaceDetector::load(&model_dir.join(DETECTOR_FILE), backends, detection_size)?;
        let recognizer = FaceRecognizer::load(&model_dir.join(RECOGNIZER_FILE), backends)?;

        let attributes_path = model_dir.join(ATTRIBUTES_FILE);
        let attributes = if attributes_path.exists() {
            match AttributeAnalyzer::load(&attributes_path, backends) {
                Ok(head) => Some(head),
                Err(e) => {
                    tracing::warn!(error = %e, "attribute head failed to load, continuing without");
                    None
                }
            }
        } else {
            tracing::info!(path = %attributes_path.display(), "no attribute model, age/gender disabled");
            None
        };

        let capabilities = ModelCapabilities {
            landmarks: true,
            attributes: attributes.is_some(),
        };

        tracing::info!(model = MODEL_NAME, detection_size, ?capabilities, "model pack loaded");

        Ok(Self {
            detector,
            recognizer,
            attributes,
            capabilities,
        })
    }
}

impl FaceModel for FaceAnalyzer {
    fn detect(&self, image: &RgbImage) -> Result<Vec<RawFace>, ModelError> {
        let detections = self.detector.detect(image)?;
        let mut faces = Vec::with_capacity(detections.len());

        for det in detections {
            let Some(landmarks) = det.landmarks else {
                // Embedding extraction needs alignment, alignment needs
                // landmarks. Skip rather than emit a partial face.
                tracing::debug!(confidence = det.confidence, "detection without landmarks, skipped");
                continue;
            };

            let aligned = alignment::align_face(image, &landmarks);
            let embedding = self.recognizer.extract(&aligned)?;

            let (age, gender) = match &self.attributes {
                Some(head) => {
                    let (age, gender) = head.analyze(&aligned)?;
                    (age, Some(gender))
                }
                None => (None, None),
            };

            faces.push(RawFace {
                x1: det.x1,
                y1: det.y1,
                x2: det.x2,
                y2: det.y2,
                score: det.confidence,
                embedding: embedding.values,
                landmarks: Some(landmarks.to_vec()),
                age,
                gender,
            });
        }

        Ok(faces)
    }

    fn capabilities(&self) -> ModelCapabilities {
        self.capabilities
    }

    fn release_cached_memory(&self) {
        // Arena shrink behavior is configured per backend at session
        // creation; nothing to do per request beyond noting the hint.
        tracing::debug!("release_cached_memory: deferring to runtime arena policy");
    }
}
