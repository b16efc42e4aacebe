//! Raw volume renderer
//!
//! Drives [`MeshState`] once per frame, uploads changed meshes to GPU buffers
//! and issues frustum-culled draw calls. Opaque geometry is drawn first,
//! transparent geometry afterwards sorted back to front.

use std::sync::Arc;

use crate::core::types::{IVec3, Mat4, Vec3};
use crate::core::Result;
use crate::math::{Frustum, Region};
use crate::mesh::{CubicExtractor, MeshMode, MeshType, SurfaceExtractor};
use crate::voxel::{Palette, RawVolume, Voxel};

use super::gpu::{BufferHandle, DrawCall, GpuBackend, VertexLayout};
use super::mesh_state::{MeshState, RendererConfig, MAX_VOLUMES};

/// Camera data for one frame
#[derive(Clone, Copy, Debug)]
pub struct RenderView {
    pub view_projection: Mat4,
    pub camera_position: Vec3,
}

impl RenderView {
    pub fn new(view: Mat4, projection: Mat4, camera_position: Vec3) -> Self {
        Self {
            view_projection: projection * view,
            camera_position,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct GpuMesh {
    handle: Option<BufferHandle>,
    index_count: u32,
}

#[derive(Clone, Copy, Debug, Default)]
struct SlotBuffers {
    opaque: GpuMesh,
    transparent: GpuMesh,
}

impl SlotBuffers {
    fn get(&self, mesh_type: MeshType) -> &GpuMesh {
        match mesh_type {
            MeshType::Opaque => &self.opaque,
            MeshType::Transparent => &self.transparent,
        }
    }

    fn get_mut(&mut self, mesh_type: MeshType) -> &mut GpuMesh {
        match mesh_type {
            MeshType::Opaque => &mut self.opaque,
            MeshType::Transparent => &mut self.transparent,
        }
    }
}

/// Per-frame statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Extraction requests handed to workers or resolved as empty
    pub scheduled: usize,
    /// Meshes moved into slots
    pub applied: usize,
    /// Slots whose buffers were refreshed
    pub uploaded: usize,
}

/// Renders up to [`MAX_VOLUMES`] raw volumes through a [`GpuBackend`]
pub struct RawVolumeRenderer<G: GpuBackend> {
    state: MeshState,
    gpu: G,
    buffers: Vec<SlotBuffers>,
    max_extractions_per_frame: usize,
    /// Mode the current buffers were created for
    buffer_mode: MeshMode,
}

impl<G: GpuBackend> RawVolumeRenderer<G> {
    /// Create a renderer meshing with [`CubicExtractor`]
    pub fn new(config: &RendererConfig, gpu: G) -> Result<Self> {
        Self::with_extractor(config, gpu, Arc::new(CubicExtractor))
    }

    pub fn with_extractor(
        config: &RendererConfig,
        gpu: G,
        extractor: Arc<dyn SurfaceExtractor>,
    ) -> Result<Self> {
        let state = MeshState::new(config, extractor)?;
        log::info!(
            "Renderer ready: {} slots, mesh size {}, {} extraction workers",
            MAX_VOLUMES,
            config.mesh_size,
            state.scheduler().worker_count()
        );
        Ok(Self {
            state,
            gpu,
            buffers: vec![SlotBuffers::default(); MAX_VOLUMES],
            max_extractions_per_frame: config.max_extractions_per_frame,
            buffer_mode: config.mesh_mode,
        })
    }

    pub fn state(&self) -> &MeshState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MeshState {
        &mut self.state
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    /// Assign a volume to a slot and return the previous one.
    ///
    /// With `delete_mesh` the slot's buffers are rebuilt from scratch and the
    /// new volume is queued for extraction. Without it the current meshes stay
    /// on screen and the caller queues the changed regions with
    /// [`RawVolumeRenderer::extract_region`].
    pub fn set_volume(
        &mut self,
        idx: usize,
        volume: Option<RawVolume>,
        palette: Arc<Palette>,
        delete_mesh: bool,
    ) -> Result<Option<RawVolume>> {
        self.state.set_volume(idx, volume, palette, delete_mesh)
    }

    pub fn volume(&self, idx: usize) -> Option<&RawVolume> {
        self.state.volume(idx)
    }

    pub fn set_voxel(&mut self, idx: usize, pos: IVec3, voxel: Voxel) -> bool {
        self.state.set_voxel(idx, pos, voxel)
    }

    pub fn extract_region(&mut self, idx: usize, region: &Region) -> bool {
        self.state.extract_region(idx, region)
    }

    pub fn extract_volume(&mut self, idx: usize) -> bool {
        self.state.extract_volume(idx)
    }

    /// Switch between cubic and marching-cubes meshes.
    ///
    /// The next [`update`](Self::update) drops all buffers and requeues every
    /// visible volume; new buffers use the matching vertex layout.
    pub fn set_mesh_mode(&mut self, mode: MeshMode) {
        self.state.set_mesh_mode(mode);
    }

    pub fn mesh_mode(&self) -> MeshMode {
        self.state.mesh_mode()
    }

    /// Schedule extraction work, collect finished meshes and refresh buffers
    pub fn update(&mut self) -> FrameStats {
        let mode = self.state.mesh_mode();
        if mode != self.buffer_mode {
            log::info!("Mesh mode changed to {mode:?}, rebuilding all meshes");
            self.delete_all_buffers();
            self.state.reset_meshes();
            self.buffer_mode = mode;
        }

        let scheduled = self.state.schedule_extractions(self.max_extractions_per_frame);
        let applied = self.state.apply_results();
        let dirty = self.state.take_dirty_slots();
        for &idx in &dirty {
            self.upload(idx);
        }
        FrameStats {
            scheduled,
            applied,
            uploaded: dirty.len(),
        }
    }

    fn upload(&mut self, idx: usize) {
        let layout = VertexLayout::for_mode(self.state.mesh_mode());
        for mesh_type in MeshType::ALL {
            let mesh = self.state.build_mesh(idx, mesh_type);
            let entry = self.buffers[idx].get_mut(mesh_type);

            if mesh.is_empty() {
                if let Some(handle) = entry.handle.take() {
                    self.gpu.delete_buffer(handle);
                }
                entry.index_count = 0;
                continue;
            }

            let handle = match entry.handle {
                Some(handle) => handle,
                None => match self.gpu.create_buffer(layout) {
                    Ok(handle) => *entry.handle.insert(handle),
                    Err(e) => {
                        log::error!("Failed to create {mesh_type:?} buffer for slot {idx}: {e}");
                        continue;
                    }
                },
            };

            match self.gpu.update_buffer(handle, &mesh) {
                Ok(()) => entry.index_count = mesh.index_count() as u32,
                Err(e) => log::error!("Failed to upload {mesh_type:?} mesh for slot {idx}: {e}"),
            }
        }
    }

    /// Index count currently uploaded for a slot
    pub fn index_count(&self, idx: usize, mesh_type: MeshType) -> u32 {
        self.buffers.get(idx).map_or(0, |b| b.get(mesh_type).index_count)
    }

    pub fn buffer_handle(&self, idx: usize, mesh_type: MeshType) -> Option<BufferHandle> {
        self.buffers.get(idx)?.get(mesh_type).handle
    }

    /// Draw all visible slots; returns the number of draw calls issued
    pub fn render(&mut self, view: &RenderView) -> usize {
        let frustum = Frustum::from_view_projection(&view.view_projection);
        let mut visible = Vec::new();
        for idx in 0..MAX_VOLUMES {
            if self.state.hidden(idx) {
                continue;
            }
            let Some(bounds) = self.state.world_bounds(idx) else {
                continue;
            };
            let culled = !frustum.intersects_aabb(&bounds);
            self.state.set_culled(idx, culled);
            if !culled {
                visible.push((idx, bounds.center().distance_squared(view.camera_position)));
            }
        }

        let mut draws = 0;
        for &(idx, _) in &visible {
            draws += usize::from(self.draw_slot(idx, MeshType::Opaque));
        }

        visible.sort_by(|a, b| b.1.total_cmp(&a.1));
        for &(idx, _) in &visible {
            draws += usize::from(self.draw_slot(idx, MeshType::Transparent));
        }
        draws
    }

    fn draw_slot(&mut self, idx: usize, mesh_type: MeshType) -> bool {
        let source = self.state.resolve_idx(idx);
        let entry = *self.buffers[source].get(mesh_type);
        let Some(buffer) = entry.handle else {
            return false;
        };
        if entry.index_count == 0 {
            return false;
        }
        self.gpu.draw(&DrawCall {
            buffer,
            model: self.state.transform(idx),
            index_count: entry.index_count,
            mesh_type,
            gray: self.state.gray(idx),
        });
        true
    }

    fn delete_all_buffers(&mut self) {
        for slot in &mut self.buffers {
            for mesh_type in MeshType::ALL {
                let entry = slot.get_mut(mesh_type);
                if let Some(handle) = entry.handle.take() {
                    self.gpu.delete_buffer(handle);
                }
                entry.index_count = 0;
            }
        }
    }

    /// Release all GPU buffers and detach every volume
    pub fn shutdown(&mut self) -> Vec<(usize, RawVolume)> {
        self.delete_all_buffers();
        self.state.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::gpu::HostGpu;

    fn renderer() -> RawVolumeRenderer<HostGpu> {
        let config = RendererConfig {
            mesh_size: 16,
            worker_threads: 2,
            ..Default::default()
        };
        RawVolumeRenderer::new(&config, HostGpu::new()).unwrap()
    }

    fn cube_volume(mins: IVec3, size: i32, color: u8) -> RawVolume {
        let mut volume = RawVolume::new(Region::cube(mins, size));
        volume.fill(Voxel::generic(color));
        volume
    }

    fn assign(renderer: &mut RawVolumeRenderer<HostGpu>, idx: usize, volume: RawVolume) {
        renderer.set_volume(idx, Some(volume), Arc::new(Palette::default()), true).unwrap();
    }

    fn settle(renderer: &mut RawVolumeRenderer<HostGpu>) {
        loop {
            renderer.update();
            renderer.state().wait_for_pending_extractions();
            let scheduler = renderer.state().scheduler();
            if renderer.state().pending_extractions() == 0 && scheduler.result_count() == 0 {
                break;
            }
        }
    }

    fn view_from(eye: Vec3, target: Vec3) -> RenderView {
        RenderView::new(
            Mat4::look_at_rh(eye, target, Vec3::Y),
            Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 1000.0),
            eye,
        )
    }

    #[test]
    fn test_volume_is_uploaded_and_drawn() {
        let mut renderer = renderer();
        assign(&mut renderer, 0, cube_volume(IVec3::ZERO, 8, 1));
        settle(&mut renderer);

        assert_eq!(renderer.index_count(0, MeshType::Opaque), 6 * 8 * 8 * 6);
        assert!(renderer.buffer_handle(0, MeshType::Transparent).is_none());

        let draws = renderer.render(&view_from(Vec3::new(4.0, 4.0, 40.0), Vec3::splat(4.0)));
        assert_eq!(draws, 1);
        assert!(!renderer.state().culled(0));
        assert_eq!(renderer.gpu().draw_calls()[0].index_count, 6 * 8 * 8 * 6);
    }

    #[test]
    fn test_volume_behind_camera_is_culled() {
        let mut renderer = renderer();
        assign(&mut renderer, 0, cube_volume(IVec3::ZERO, 8, 1));
        settle(&mut renderer);

        let away = view_from(Vec3::new(4.0, 4.0, 40.0), Vec3::new(4.0, 4.0, 100.0));
        assert_eq!(renderer.render(&away), 0);
        assert!(renderer.state().culled(0));
    }

    #[test]
    fn test_hidden_slots_are_not_drawn() {
        let mut renderer = renderer();
        assign(&mut renderer, 0, cube_volume(IVec3::ZERO, 8, 1));
        settle(&mut renderer);
        renderer.state_mut().set_hidden(0, true).unwrap();
        assert_eq!(renderer.render(&view_from(Vec3::new(4.0, 4.0, 40.0), Vec3::splat(4.0))), 0);
    }

    #[test]
    fn test_edit_reuploads_slot() {
        let mut renderer = renderer();
        assign(&mut renderer, 0, cube_volume(IVec3::ZERO, 8, 1));
        settle(&mut renderer);
        let handle = renderer.buffer_handle(0, MeshType::Opaque).unwrap();

        assert!(renderer.set_voxel(0, IVec3::new(7, 7, 7), Voxel::AIR));
        settle(&mut renderer);

        // Removing a corner voxel keeps the face count: three faces vanish, three appear
        assert_eq!(renderer.index_count(0, MeshType::Opaque), 6 * 8 * 8 * 6);
        assert_eq!(renderer.buffer_handle(0, MeshType::Opaque), Some(handle));
        assert_eq!(renderer.gpu().buffer(handle).unwrap().uploads, 2);
    }

    #[test]
    fn test_reference_slot_draws_referenced_buffers() {
        let mut renderer = renderer();
        assign(&mut renderer, 1, cube_volume(IVec3::ZERO, 4, 1));
        renderer.state_mut().set_reference(0, Some(1)).unwrap();
        renderer
            .state_mut()
            .set_model_matrix(0, Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)), Vec3::ZERO)
            .unwrap();
        settle(&mut renderer);

        assert!(renderer.buffer_handle(0, MeshType::Opaque).is_none());
        let first = renderer.buffer_handle(1, MeshType::Opaque).unwrap();

        let view = view_from(Vec3::new(8.0, 2.0, 60.0), Vec3::new(8.0, 2.0, 0.0));
        assert_eq!(renderer.render(&view), 2);
        let calls = renderer.gpu_mut().take_draw_calls();
        let reference_call = calls.iter().find(|c| c.model != Mat4::IDENTITY).unwrap();
        assert_eq!(reference_call.buffer, first);
        assert_eq!(reference_call.index_count, 6 * 4 * 4 * 6);

        // Reassigning the referenced slot changes what the reference draws
        assign(&mut renderer, 1, cube_volume(IVec3::ZERO, 2, 1));
        settle(&mut renderer);
        assert_eq!(renderer.render(&view), 2);
        let calls = renderer.gpu_mut().take_draw_calls();
        let reference_call = calls.iter().find(|c| c.model != Mat4::IDENTITY).unwrap();
        assert_eq!(reference_call.index_count, 6 * 2 * 2 * 6);
    }

    #[test]
    fn test_transparent_sorted_back_to_front() {
        let mut palette = Palette::default();
        palette.set_color(3, [255, 0, 0, 128]);
        let palette = Arc::new(palette);

        let mut renderer = renderer();
        let near_volume = cube_volume(IVec3::ZERO, 2, 3);
        let far_volume = cube_volume(IVec3::new(0, 0, -20), 2, 3);
        renderer.set_volume(0, Some(near_volume), palette.clone(), true).unwrap();
        renderer.set_volume(1, Some(far_volume), palette, true).unwrap();
        settle(&mut renderer);

        let near = renderer.buffer_handle(0, MeshType::Transparent).unwrap();
        let far = renderer.buffer_handle(1, MeshType::Transparent).unwrap();
        let view = view_from(Vec3::new(1.0, 1.0, 30.0), Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(renderer.render(&view), 2);
        let order: Vec<_> = renderer.gpu().draw_calls().iter().map(|c| c.buffer).collect();
        assert_eq!(order, vec![far, near]);
    }

    #[test]
    fn test_failed_upload_keeps_previous_buffer() {
        let mut renderer = renderer();
        assign(&mut renderer, 0, cube_volume(IVec3::ZERO, 8, 1));
        settle(&mut renderer);
        let handle = renderer.buffer_handle(0, MeshType::Opaque).unwrap();
        let before = renderer.gpu().buffer(handle).unwrap().indices.clone();

        renderer.gpu_mut().set_fail_updates(true);
        assert!(renderer.set_voxel(0, IVec3::new(3, 7, 3), Voxel::AIR));
        settle(&mut renderer);

        assert_eq!(renderer.gpu().failed_updates(), 1);
        assert_eq!(renderer.gpu().buffer(handle).unwrap().indices, before);
        assert_eq!(renderer.index_count(0, MeshType::Opaque), before.len() as u32);
    }

    #[test]
    fn test_mesh_mode_change_recreates_buffers() {
        let mut renderer = renderer();
        assign(&mut renderer, 0, cube_volume(IVec3::ZERO, 8, 1));
        settle(&mut renderer);
        let cubic = renderer.buffer_handle(0, MeshType::Opaque).unwrap();

        renderer.set_mesh_mode(MeshMode::MarchingCubes);
        assert!(renderer.gpu().buffer(cubic).is_some());
        settle(&mut renderer);
        assert!(renderer.gpu().buffer(cubic).is_none());

        let smooth = renderer.buffer_handle(0, MeshType::Opaque).unwrap();
        assert_ne!(smooth, cubic);
        let buffer = renderer.gpu().buffer(smooth).unwrap();
        assert_eq!(buffer.layout, VertexLayout::MarchingCubes);
        assert!(!buffer.normal_bytes.is_empty());
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let mut renderer = renderer();
        assign(&mut renderer, 2, cube_volume(IVec3::ZERO, 8, 1));
        settle(&mut renderer);
        assert_eq!(renderer.gpu().buffer_count(), 1);

        let volumes = renderer.shutdown();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].0, 2);
        assert_eq!(renderer.gpu().buffer_count(), 0);
        assert_eq!(renderer.render(&view_from(Vec3::new(4.0, 4.0, 40.0), Vec3::splat(4.0))), 0);
    }
}
