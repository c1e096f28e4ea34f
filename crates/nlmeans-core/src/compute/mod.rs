mod backend;
pub mod buffer;
pub mod cpu;
#[cfg(feature = "gpu")]
pub mod wgpu_backend;

pub use backend::{create_engine, CompiledPipeline, DevicePreference, ExecutionEngine};
pub use buffer::{DeviceAllocation, ImageBuffer, SyncState};
