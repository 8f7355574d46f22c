use std::path::PathBuf;

/// Upper bound on in-flight inference when an accelerator is bound.
const ACCELERATED_MAX_WORKERS: usize = 4;
/// Upper bound on in-flight inference on CPU.
const CPU_MAX_WORKERS: usize = 2;
/// Batch request ceiling when an accelerator is bound.
const ACCELERATED_MAX_BATCH: usize = 2000;
/// Batch request ceiling on CPU.
const CPU_MAX_BATCH: usize = 1000;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Skip accelerator probing and bind the CPU backend directly.
    pub force_cpu: bool,
    /// Accelerator device index to bind.
    pub device_id: u32,
    /// Minimum face side in pixels; smaller detections are dropped.
    pub min_face_size: i32,
    /// Override for the worker ceiling; defaults depend on the backend.
    pub max_workers: Option<usize>,
    /// Override for the batch ceiling; defaults depend on the backend.
    pub max_batch_size: Option<usize>,
    /// Ask the model to release scratch memory after accelerated requests.
    pub memory_optimization: bool,
    /// Fan batch items out across workers instead of running sequentially.
    pub parallel_processing: bool,
}

impl Config {
    /// Load configuration from `FACESIGHT_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("FACESIGHT_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| facesight_core::default_model_dir());

        Self {
            model_dir,
            force_cpu: env_flag("FACESIGHT_FORCE_CPU", false),
            device_id: env_u32("FACESIGHT_DEVICE_ID", 0),
            min_face_size: env_i32(
                "FACESIGHT_MIN_FACE_SIZE",
                facesight_core::pipeline::DEFAULT_MIN_FACE_SIZE,
            ),
            max_workers: env_opt_usize("FACESIGHT_MAX_WORKERS"),
            max_batch_size: env_opt_usize("FACESIGHT_MAX_BATCH_SIZE"),
            memory_optimization: env_flag("FACESIGHT_MEMORY_OPTIMIZATION", true),
            parallel_processing: env_flag("FACESIGHT_PARALLEL", true),
        }
    }

    /// Worker ceiling for the bound backend, explicit override first.
    pub fn effective_max_workers(&self, accelerated: bool) -> usize {
        self.max_workers
            .unwrap_or(if accelerated {
                ACCELERATED_MAX_WORKERS
            } else {
                CPU_MAX_WORKERS
            })
            .max(1)
    }

    /// Batch ceiling for the bound backend, explicit override first.
    pub fn effective_max_batch(&self, accelerated: bool) -> usize {
        self.max_batch_size
            .unwrap_or(if accelerated {
                ACCELERATED_MAX_BATCH
            } else {
                CPU_MAX_BATCH
            })
            .max(1)
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key).map(|v| v != "0").unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i32(key: &str, default: i32) -> i32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            model_dir: PathBuf::from("/tmp/models"),
            force_cpu: false,
            device_id: 0,
            min_face_size: 50,
            max_workers: None,
            max_batch_size: None,
            memory_optimization: true,
            parallel_processing: true,
        }
    }

    #[test]
    fn test_worker_defaults_track_backend() {
        let config = base_config();
        assert_eq!(config.effective_max_workers(true), 4);
        assert_eq!(config.effective_max_workers(false), 2);
    }

    #[test]
    fn test_batch_defaults_track_backend() {
        let config = base_config();
        assert_eq!(config.effective_max_batch(true), 2000);
        assert_eq!(config.effective_max_batch(false), 1000);
    }

    #[test]
    fn test_overrides_win() {
        let config = Config {
            max_workers: Some(8),
            max_batch_size: Some(16),
            ..base_config()
        };
        assert_eq!(config.effective_max_workers(false), 8);
        assert_eq!(config.effective_max_batch(true), 16);
    }

    #[test]
    fn test_zero_override_clamped_to_one() {
        let config = Config {
            max_workers: Some(0),
            max_batch_size: Some(0),
            ..base_config()
        };
        assert_eq!(config.effective_max_workers(true), 1);
        assert_eq!(config.effective_max_batch(false), 1);
    }
}
