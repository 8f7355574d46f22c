//! Model session lifecycle: bind the pack to the best available backend,
//! falling back to CPU when accelerated initialization fails.

use std::path::PathBuf;

use facesight_hw::{fallback_chain, BackendDescriptor, BackendKind, CapabilitySnapshot};
use serde::Serialize;
use thiserror::Error;

use crate::analyzer::FaceAnalyzer;
use crate::model::{FaceModel, ModelError};

/// Detection grid side for CPU sessions.
pub const DETECTION_SIZE_CPU: usize = 640;
/// Detection grid side when an accelerator is bound.
pub const DETECTION_SIZE_ACCELERATED: usize = 1024;

#[derive(Error, Debug)]
pub enum InitError {
    #[error("failed to initialize {backend} backend: {source}")]
    Backend {
        backend: String,
        source: ModelError,
    },
    #[error("accelerated load on {preferred} failed and so did the CPU retry: {source}")]
    BothFailed {
        preferred: String,
        source: ModelError,
    },
}

/// Where and how the model ended up loaded. Reported verbatim by the
/// daemon's model_info surface.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub device_label: String,
    pub backend: BackendDescriptor,
    pub detection_size: (u32, u32),
    pub accelerated: bool,
    /// True when the accelerated attempt failed and the session runs on
    /// the CPU retry path.
    pub fallback: bool,
    pub loaded: bool,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub model_dir: PathBuf,
    pub force_cpu: bool,
    pub device_id: u32,
}

/// A loaded model bound to one backend.
pub struct ModelSession {
    model: Box<dyn FaceModel>,
    state: SessionState,
}

impl ModelSession {
    /// Load the model pack against the capability snapshot.
    ///
    /// The first attempt registers the full fallback chain and sizes the
    /// detector for the chain's head. If that head is accelerated and the
    /// load fails, one CPU-only retry runs at the CPU detection size; only
    /// when both attempts fail is the error surfaced.
    pub fn initialize(
        snapshot: &CapabilitySnapshot,
        options: &SessionOptions,
    ) -> Result<Self, InitError> {
        let chain = if options.force_cpu {
            vec![BackendDescriptor::cpu()]
        } else {
            fallback_chain(snapshot, options.device_id)
        };

        // Chain is never empty: CPU is always appended.
        let primary = chain[0].clone();
        let accelerated = primary.is_accelerated();
        let detection_size = if accelerated {
            DETECTION_SIZE_ACCELERATED
        } else {
            DETECTION_SIZE_CPU
        };

        tracing::info!(
            backend = primary.kind.provider_name(),
            detection_size,
            "initializing model session"
        );

        match FaceAnalyzer::load(&options.model_dir, &chain, detection_size) {
            Ok(model) => Ok(Self {
                model: Box::new(model),
                state: SessionState {
                    device_label: device_label(&primary),
                    backend: primary,
                    detection_size: (detection_size as u32, detection_size as u32),
                    accelerated,
                    fallback: false,
                    loaded: true,
                },
            }),
            Err(e) if accelerated => {
                tracing::warn!(
                    backend = primary.kind.provider_name(),
                    error = %e,
                    "accelerated initialization failed, retrying on CPU"
                );

                let cpu = BackendDescriptor::cpu();
                let model = FaceAnalyzer::load(
                    &options.model_dir,
                    std::slice::from_ref(&cpu),
                    DETECTION_SIZE_CPU,
                )
                .map_err(|source| InitError::BothFailed {
                    preferred: primary.kind.provider_name().to_string(),
                    source,
                })?;

                Ok(Self {
                    model: Box::new(model),
                    state: SessionState {
                        device_label: "CPU (fallback)".to_string(),
                        backend: cpu,
                        detection_size: (DETECTION_SIZE_CPU as u32, DETECTION_SIZE_CPU as u32),
                        accelerated: false,
                        fallback: true,
                        loaded: true,
                    },
                })
            }
            Err(source) => Err(InitError::Backend {
                backend: primary.kind.provider_name().to_string(),
                source,
            }),
        }
    }

    /// Assemble a session from an already-loaded model. Lets callers bind
    /// their own [`FaceModel`] implementation, mainly for tests.
    pub fn from_parts(model: Box<dyn FaceModel>, state: SessionState) -> Self {
        Self { model, state }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn model(&self) -> &dyn FaceModel {
        self.model.as_ref()
    }
}

fn device_label(backend: &BackendDescriptor) -> String {
    match backend.kind {
        BackendKind::Cpu => "CPU".to_string(),
        BackendKind::Cuda => format!("GPU {} (CUDA)", backend.device_id()),
        BackendKind::TensorRt => format!("GPU {} (ONNX)", backend.device_id()),
    }
}
