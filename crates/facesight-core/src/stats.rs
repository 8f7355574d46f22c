//! Rolling processing statistics.

use serde::Serialize;

/// Weight kept from the previous average on each update.
const SMOOTHING_KEEP: f64 = 0.9;
/// Weight given to the newest sample.
const SMOOTHING_BLEND: f64 = 0.1;

/// Accelerator memory summary reported alongside stats.
#[derive(Debug, Clone, Serialize)]
pub struct AcceleratorMemory {
    pub device_count: usize,
    /// Total VRAM across devices, when the platform exposes it.
    pub total_bytes: Option<u64>,
}

/// Exponentially smoothed per-session counters. Updated only for requests
/// that reach the model and come back without a model error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingStats {
    pub total_processed: u64,
    pub total_faces_detected: u64,
    /// Smoothed seconds per request. Zero until the first sample lands.
    pub average_processing_time: f64,
    pub accelerator_memory: Option<AcceleratorMemory>,
}

impl ProcessingStats {
    pub fn record(&mut self, elapsed_secs: f64, faces_detected: u64) {
        self.total_processed += 1;
        self.total_faces_detected += faces_detected;
        if self.average_processing_time == 0.0 {
            self.average_processing_time = elapsed_secs;
        } else {
            self.average_processing_time =
                self.average_processing_time * SMOOTHING_KEEP + elapsed_secs * SMOOTHING_BLEND;
        }
    }

    /// Derived throughput, absent until at least one sample has landed.
    pub fn faces_per_second(&self) -> Option<f64> {
        if self.average_processing_time > 0.0 {
            Some(1.0 / self.average_processing_time)
        } else {
            None
        }
    }
}
