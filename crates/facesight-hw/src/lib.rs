//! facesight-hw — Runtime capability probing and backend selection.
//!
//! Inspects the host for accelerator hardware and the ONNX Runtime
//! execution-provider registry, and builds the ordered backend fallback
//! chain the model session binds to.

pub mod backend;
pub mod probe;

pub use backend::{fallback_chain, BackendDescriptor, BackendKind};
pub use probe::{probe, AcceleratorKind, CapabilitySnapshot};
