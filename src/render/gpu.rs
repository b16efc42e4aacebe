//! GPU buffer interface used by the renderer
//!
//! The renderer only needs to create, fill, delete and draw indexed vertex
//! buffers. [`HostGpu`] implements the interface in host memory for headless
//! runs and tests.

use std::collections::HashMap;

use crate::core::types::Mat4;
use crate::core::{Error, Result};
use crate::mesh::{Mesh, MeshMode, MeshType, VoxelVertex};

/// Opaque buffer identifier issued by a [`GpuBackend`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Vertex streams of a buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// Position + color
    Cubic,
    /// Position + color, plus a normal stream
    MarchingCubes,
}

impl VertexLayout {
    pub fn for_mode(mode: MeshMode) -> Self {
        match mode {
            MeshMode::Cubic => VertexLayout::Cubic,
            MeshMode::MarchingCubes => VertexLayout::MarchingCubes,
        }
    }

    pub fn has_normals(&self) -> bool {
        matches!(self, VertexLayout::MarchingCubes)
    }

    /// Bytes per vertex across all streams
    pub fn stride(&self) -> usize {
        let base = std::mem::size_of::<VoxelVertex>();
        if self.has_normals() { base + std::mem::size_of::<[f32; 3]>() } else { base }
    }
}

/// One indexed draw
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCall {
    pub buffer: BufferHandle,
    pub model: Mat4,
    pub index_count: u32,
    pub mesh_type: MeshType,
    /// Render desaturated (inactive volumes in an editor)
    pub gray: bool,
}

/// Minimal buffer API the renderer drives
pub trait GpuBackend {
    fn create_buffer(&mut self, layout: VertexLayout) -> Result<BufferHandle>;

    /// Replace the buffer contents with `mesh`.
    ///
    /// On error the previous contents must remain intact.
    fn update_buffer(&mut self, handle: BufferHandle, mesh: &Mesh) -> Result<()>;

    fn delete_buffer(&mut self, handle: BufferHandle);

    fn draw(&mut self, call: &DrawCall);
}

/// Contents of a host-side buffer
#[derive(Clone, Debug)]
pub struct HostBuffer {
    pub layout: VertexLayout,
    pub vertex_bytes: Vec<u8>,
    pub normal_bytes: Vec<u8>,
    pub indices: Vec<u32>,
    /// Number of successful updates
    pub uploads: usize,
}

impl HostBuffer {
    pub fn vertex_count(&self) -> usize {
        self.vertex_bytes.len() / std::mem::size_of::<VoxelVertex>()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

/// Recording backend keeping all buffers in host memory
#[derive(Debug, Default)]
pub struct HostGpu {
    buffers: HashMap<BufferHandle, HostBuffer>,
    next_handle: u32,
    draw_calls: Vec<DrawCall>,
    fail_updates: bool,
    failed_updates: usize,
}

impl HostGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&HostBuffer> {
        self.buffers.get(&handle)
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Total bytes held by all buffers
    pub fn memory_usage(&self) -> usize {
        self.buffers
            .values()
            .map(|b| {
                b.vertex_bytes.len()
                    + b.normal_bytes.len()
                    + b.indices.len() * std::mem::size_of::<u32>()
            })
            .sum()
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }

    pub fn take_draw_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.draw_calls)
    }

    /// Make every following update fail
    pub fn set_fail_updates(&mut self, fail: bool) {
        self.fail_updates = fail;
    }

    pub fn failed_updates(&self) -> usize {
        self.failed_updates
    }
}

impl GpuBackend for HostGpu {
    fn create_buffer(&mut self, layout: VertexLayout) -> Result<BufferHandle> {
        self.next_handle += 1;
        let handle = BufferHandle(self.next_handle);
        self.buffers.insert(
            handle,
            HostBuffer {
                layout,
                vertex_bytes: Vec::new(),
                normal_bytes: Vec::new(),
                indices: Vec::new(),
                uploads: 0,
            },
        );
        Ok(handle)
    }

    fn update_buffer(&mut self, handle: BufferHandle, mesh: &Mesh) -> Result<()> {
        if self.fail_updates {
            self.failed_updates += 1;
            return Err(Error::Gpu(format!("injected update failure for buffer {}", handle.0)));
        }
        let buffer = self
            .buffers
            .get_mut(&handle)
            .ok_or_else(|| Error::Gpu(format!("unknown buffer {}", handle.0)))?;

        buffer.vertex_bytes = bytemuck::cast_slice(mesh.vertices()).to_vec();
        buffer.normal_bytes = if buffer.layout.has_normals() {
            bytemuck::cast_slice(mesh.normals()).to_vec()
        } else {
            Vec::new()
        };
        buffer.indices = mesh.indices().to_vec();
        buffer.uploads += 1;
        Ok(())
    }

    fn delete_buffer(&mut self, handle: BufferHandle) {
        self.buffers.remove(&handle);
    }

    fn draw(&mut self, call: &DrawCall) {
        self.draw_calls.push(*call);
    }
}
