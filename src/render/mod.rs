//! Volume rendering: mesh bookkeeping, GPU buffers and draw submission

pub mod gpu;
pub mod mesh_state;
pub mod renderer;

pub use gpu::{BufferHandle, DrawCall, GpuBackend, HostBuffer, HostGpu, VertexLayout};
pub use mesh_state::{MeshState, RendererConfig, MAX_VOLUMES};
pub use renderer::{FrameStats, RawVolumeRenderer, RenderView};
