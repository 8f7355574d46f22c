//! Backend descriptors and the fallback chain.
//!
//! A backend descriptor names one execution target plus its tuning
//! parameters. The chain is ordered by priority, de-duplicated, and always
//! terminated by the CPU backend so a load attempt can never run out of
//! targets.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::probe::CapabilitySnapshot;

/// TensorRT engine build workspace cap.
const TENSORRT_WORKSPACE_BYTES: u64 = 2 * 1024 * 1024 * 1024;
/// CUDA arena cap, matching the TensorRT workspace.
const CUDA_MEM_LIMIT_BYTES: u64 = 2 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BackendKind {
    TensorRt,
    Cuda,
    Cpu,
}

impl BackendKind {
    /// ONNX Runtime registry name for this backend.
    pub fn provider_name(&self) -> &'static str {
        match self {
            BackendKind::TensorRt => "TensorrtExecutionProvider",
            BackendKind::Cuda => "CUDAExecutionProvider",
            BackendKind::Cpu => "CPUExecutionProvider",
        }
    }

    pub fn is_accelerated(&self) -> bool {
        !matches!(self, BackendKind::Cpu)
    }
}

/// One execution target with its tuning parameters. Lower priority wins.
#[derive(Debug, Clone, Serialize)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub priority: u8,
    pub tuning: Map<String, Value>,
}

impl BackendDescriptor {
    pub fn tensorrt(device_id: u32) -> Self {
        let tuning = json!({
            "device_id": device_id,
            "trt_max_workspace_size": TENSORRT_WORKSPACE_BYTES,
            "trt_fp16_enable": true,
        });
        Self {
            kind: BackendKind::TensorRt,
            priority: 0,
            tuning: into_map(tuning),
        }
    }

    pub fn cuda(device_id: u32) -> Self {
        let tuning = json!({
            "device_id": device_id,
            "arena_extend_strategy": "kNextPowerOfTwo",
            "gpu_mem_limit": CUDA_MEM_LIMIT_BYTES,
            "cudnn_conv_algo_search": "EXHAUSTIVE",
            "do_copy_in_default_stream": true,
        });
        Self {
            kind: BackendKind::Cuda,
            priority: 1,
            tuning: into_map(tuning),
        }
    }

    pub fn cpu() -> Self {
        let tuning = json!({
            "arena_extend_strategy": "kSameAsRequested",
        });
        Self {
            kind: BackendKind::Cpu,
            priority: u8::MAX,
            tuning: into_map(tuning),
        }
    }

    pub fn is_accelerated(&self) -> bool {
        self.kind.is_accelerated()
    }

    /// Device index from the tuning map; CPU descriptors have none.
    pub fn device_id(&self) -> u32 {
        self.tuning
            .get("device_id")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Build the ordered fallback chain for a capability snapshot.
///
/// Accelerated backends are emitted only for providers the runtime
/// actually reports; the CPU backend is always present and always last.
pub fn fallback_chain(snapshot: &CapabilitySnapshot, device_id: u32) -> Vec<BackendDescriptor> {
    let mut chain = Vec::new();

    if snapshot.accelerator_available {
        let has = |kind: BackendKind| {
            snapshot
                .providers
                .iter()
                .any(|p| p == kind.provider_name())
        };
        if has(BackendKind::TensorRt) {
            chain.push(BackendDescriptor::tensorrt(device_id));
        }
        if has(BackendKind::Cuda) {
            chain.push(BackendDescriptor::cuda(device_id));
        }
    }

    chain.push(BackendDescriptor::cpu());

    // De-duplicate by kind, keeping the first (highest-priority) occurrence.
    let mut seen = Vec::new();
    chain.retain(|b| {
        if seen.contains(&b.kind) {
            false
        } else {
            seen.push(b.kind);
            true
        }
    });

    chain
}
