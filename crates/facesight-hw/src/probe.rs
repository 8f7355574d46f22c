//! Accelerator capability probing.
//!
//! Combines two independent signals: the NVIDIA kernel driver's
//! procfs/devfs surface, and the ONNX Runtime execution-provider registry.
//! The accelerator counts as available when either signal is positive.
//! Probing never fails — any error on either path degrades to
//! "not available" for that signal.

use std::path::Path;

use ort::execution_providers::{
    CUDAExecutionProvider, ExecutionProvider, TensorRTExecutionProvider,
};
use serde::Serialize;

const NVIDIA_PROC_GPUS: &str = "/proc/driver/nvidia/gpus";
const NVIDIA_DEV_CTL: &str = "/dev/nvidiactl";

/// Which accelerator signal fired, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceleratorKind {
    None,
    /// The NVIDIA kernel driver is present.
    Cuda,
    /// Only the inference runtime reports a GPU provider.
    OnnxGpu,
}

/// Immutable snapshot of what the host can run, taken once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilitySnapshot {
    pub accelerator_available: bool,
    pub accelerator_kind: AcceleratorKind,
    pub device_count: usize,
    pub memory_bytes: Option<u64>,
    /// Execution providers the inference runtime reports as usable,
    /// in preference order. CPU is always included.
    pub providers: Vec<String>,
}

impl CapabilitySnapshot {
    /// Snapshot describing a host with no usable accelerator.
    pub fn cpu_only() -> Self {
        Self {
            accelerator_available: false,
            accelerator_kind: AcceleratorKind::None,
            device_count: 0,
            memory_bytes: None,
            providers: vec!["CPUExecutionProvider".to_string()],
        }
    }
}

/// Probe the host for accelerator capability.
///
/// `force_cpu` is the operational escape hatch: it short-circuits probing
/// and returns a CPU-only snapshot regardless of installed hardware.
pub fn probe(force_cpu: bool) -> CapabilitySnapshot {
    if force_cpu {
        tracing::info!("accelerator probing disabled (force_cpu), using CPU");
        return CapabilitySnapshot::cpu_only();
    }

    let device_count = nvidia_gpu_count(Path::new(NVIDIA_PROC_GPUS));
    let driver_present = device_count > 0 || Path::new(NVIDIA_DEV_CTL).exists();
    let providers = available_providers();
    let runtime_gpu = providers
        .iter()
        .any(|p| p == "CUDAExecutionProvider" || p == "TensorrtExecutionProvider");

    let accelerator_kind = if driver_present {
        AcceleratorKind::Cuda
    } else if runtime_gpu {
        AcceleratorKind::OnnxGpu
    } else {
        AcceleratorKind::None
    };
    let accelerator_available = driver_present || runtime_gpu;

    let snapshot = CapabilitySnapshot {
        accelerator_available,
        accelerator_kind,
        device_count,
        // The driver procfs does not expose VRAM size; left unset.
        memory_bytes: None,
        providers,
    };

    if accelerator_available {
        tracing::info!(
            kind = ?snapshot.accelerator_kind,
            devices = snapshot.device_count,
            providers = ?snapshot.providers,
            "accelerator detected"
        );
    } else {
        tracing::info!("no accelerator detected, using CPU");
    }

    snapshot
}

/// Count GPUs registered with the NVIDIA kernel driver. Missing directory
/// or unreadable entries count as zero.
fn nvidia_gpu_count(gpus_dir: &Path) -> usize {
    match std::fs::read_dir(gpus_dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .count(),
        Err(_) => 0,
    }
}

/// Ask the inference runtime which execution providers it can actually use.
/// Registry errors degrade to "not listed". CPU is always appended.
fn available_providers() -> Vec<String> {
    let mut providers = Vec::new();
    if TensorRTExecutionProvider::default()
        .is_available()
        .unwrap_or(false)
    {
        providers.push("TensorrtExecutionProvider".to_string());
    }
    if CUDAExecutionProvider::default()
        .is_available()
        .unwrap_or(false)
    {
        providers.push("CUDAExecutionProvider".to_string());
    }
    providers.push("CPUExecutionProvider".to_string());
    providers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_only_snapshot() {
        let snap = CapabilitySnapshot::cpu_only();
        assert!(!snap.accelerator_available);
        assert_eq!(snap.accelerator_kind, AcceleratorKind::None);
        assert_eq!(snap.device_count, 0);
        assert_eq!(snap.providers, vec!["CPUExecutionProvider".to_string()]);
    }

    #[test]
    fn test_force_cpu_ignores_hardware() {
        let snap = probe(true);
        assert!(!snap.accelerator_available);
        assert_eq!(snap.accelerator_kind, AcceleratorKind::None);
    }

    #[test]
    fn test_gpu_count_missing_dir() {
        assert_eq!(
            nvidia_gpu_count(Path::new("/nonexistent/driver/gpus")),
            0
        );
    }

    #[test]
    fn test_gpu_count_counts_directories() {
        let root = std::env::temp_dir().join(format!("facesight-probe-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("0000:01:00.0")).unwrap();
        std::fs::create_dir_all(root.join("0000:02:00.0")).unwrap();
        std::fs::write(root.join("README"), b"not a gpu").unwrap();

        assert_eq!(nvidia_gpu_count(&root), 2);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_available_providers_always_include_cpu() {
        let providers = available_providers();
        assert_eq!(providers.last().map(String::as_str), Some("CPUExecutionProvider"));
    }
}
