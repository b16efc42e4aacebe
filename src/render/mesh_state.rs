//! Per-slot volume and mesh bookkeeping
//!
//! `MeshState` owns the volumes assigned to renderer slots, turns dirty regions
//! into mesh-tile extraction requests, feeds the extraction scheduler and keeps
//! the host-side meshes of every tile. GPU buffers are handled by
//! [`RawVolumeRenderer`](super::RawVolumeRenderer).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::types::{IVec3, Mat4, Vec3};
use crate::core::{Error, Result};
use crate::extract::{ExtractQueue, ExtractRegion, ExtractionJob, ExtractionScheduler};
use crate::math::{Aabb, Region};
use crate::mesh::{ExtractedMesh, Mesh, MeshMode, MeshType, SurfaceExtractor};
use crate::voxel::{Palette, RawVolume, Voxel};

/// Number of renderer slots
pub const MAX_VOLUMES: usize = 256;

/// Voxels of context copied around each tile so boundary faces are correct
pub const EXTRACTION_BORDER: i32 = 2;

/// Renderer configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Edge length of a mesh tile in voxels
    pub mesh_size: u32,
    /// Extraction requests processed per `update`
    pub max_extractions_per_frame: usize,
    /// Worker threads for extraction (0 = one per core)
    pub worker_threads: usize,
    pub mesh_mode: MeshMode,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mesh_size: 64,
            max_extractions_per_frame: 16,
            worker_threads: 0,
            mesh_mode: MeshMode::Cubic,
        }
    }
}

impl RendererConfig {
    pub fn validate(&self) -> Result<()> {
        if self.mesh_size == 0 {
            return Err(Error::InvalidConfig("mesh_size must be greater than zero".into()));
        }
        if self.max_extractions_per_frame == 0 {
            return Err(Error::InvalidConfig(
                "max_extractions_per_frame must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Minimum corner of a mesh tile, ordered z-major like `Region::positions`
type TileKey = [i32; 3];

fn tile_key(tile_mins: IVec3) -> TileKey {
    [tile_mins.z, tile_mins.y, tile_mins.x]
}

#[derive(Debug)]
struct Slot {
    volume: Option<RawVolume>,
    palette: Arc<Palette>,
    model: Mat4,
    pivot: Vec3,
    hidden: bool,
    gray: bool,
    culled: bool,
    /// Slot whose meshes this slot draws
    reference: Option<usize>,
    /// Bumped whenever queued or in-flight work for this slot becomes stale
    generation: u64,
    /// Host meshes keyed by tile minimum corner
    tiles: BTreeMap<TileKey, ExtractedMesh>,
    /// Sequence of the newest extraction dispatched per tile
    latest: HashMap<TileKey, u64>,
    /// Tiles changed since the last upload
    dirty: bool,
    /// Meshes were dropped while hidden and must be rebuilt once visible
    needs_full_extraction: bool,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            volume: None,
            palette: Arc::new(Palette::default()),
            model: Mat4::IDENTITY,
            pivot: Vec3::ZERO,
            hidden: false,
            gray: false,
            culled: false,
            reference: None,
            generation: 0,
            tiles: BTreeMap::new(),
            latest: HashMap::new(),
            dirty: false,
            needs_full_extraction: false,
        }
    }
}

/// Volumes, extraction requests and host meshes of all renderer slots
pub struct MeshState {
    slots: Vec<Slot>,
    queue: ExtractQueue,
    scheduler: ExtractionScheduler,
    mesh_size: i32,
    mesh_mode: MeshMode,
    /// Stamped on every dispatched extraction
    next_sequence: u64,
}

impl MeshState {
    pub fn new(config: &RendererConfig, extractor: Arc<dyn SurfaceExtractor>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            slots: (0..MAX_VOLUMES).map(|_| Slot::default()).collect(),
            queue: ExtractQueue::new(),
            scheduler: ExtractionScheduler::new(config.worker_threads, extractor)?,
            mesh_size: config.mesh_size as i32,
            mesh_mode: config.mesh_mode,
            next_sequence: 0,
        })
    }

    fn slot(&self, idx: usize) -> Result<&Slot> {
        self.slots.get(idx).ok_or(Error::InvalidSlot(idx))
    }

    fn slot_mut(&mut self, idx: usize) -> Result<&mut Slot> {
        self.slots.get_mut(idx).ok_or(Error::InvalidSlot(idx))
    }

    /// Assign `volume` to slot `idx` and return the previously assigned volume.
    ///
    /// With `delete_mesh` the slot's meshes are dropped, every queued or
    /// in-flight extraction for it becomes stale and the new volume is queued
    /// for extraction (once visible, for hidden slots). Without it the old
    /// meshes stay until the caller queues the changed regions.
    pub fn set_volume(
        &mut self,
        idx: usize,
        volume: Option<RawVolume>,
        palette: Arc<Palette>,
        delete_mesh: bool,
    ) -> Result<Option<RawVolume>> {
        let slot = self.slot_mut(idx)?;
        let previous = std::mem::replace(&mut slot.volume, volume);
        slot.palette = palette;
        let assigned = slot.volume.is_some();
        log::debug!("Slot {idx}: volume {}", if assigned { "assigned" } else { "removed" });
        if !delete_mesh {
            return Ok(previous);
        }

        slot.generation += 1;
        slot.latest.clear();
        if !slot.tiles.is_empty() {
            slot.tiles.clear();
            slot.dirty = true;
        }
        let owns_meshes = assigned && slot.reference.is_none();
        slot.needs_full_extraction = owns_meshes && slot.hidden;
        if owns_meshes && !slot.hidden {
            self.extract_volume(idx);
        }
        Ok(previous)
    }

    pub fn volume(&self, idx: usize) -> Option<&RawVolume> {
        self.slots.get(idx)?.volume.as_ref()
    }

    /// Mutable access for edits; call [`MeshState::extract_region`] afterwards
    pub fn volume_mut(&mut self, idx: usize) -> Option<&mut RawVolume> {
        self.slots.get_mut(idx)?.volume.as_mut()
    }

    pub fn palette(&self, idx: usize) -> Option<&Arc<Palette>> {
        self.slots.get(idx).map(|slot| &slot.palette)
    }

    /// Write a voxel into the slot's volume and queue the affected tiles
    pub fn set_voxel(&mut self, idx: usize, pos: IVec3, voxel: Voxel) -> bool {
        let written = self
            .volume_mut(idx)
            .is_some_and(|volume| volume.set_voxel_at(pos, voxel));
        written && self.extract_region(idx, &Region::point(pos))
    }

    /// Queue re-extraction of every mesh tile touched by `region`.
    ///
    /// The region is grown by one voxel so faces of neighboring tiles are
    /// refreshed too. Tiles outside the volume lose their mesh instead.
    /// Returns false for empty and reference slots.
    pub fn extract_region(&mut self, idx: usize, region: &Region) -> bool {
        let mesh_size = self.mesh_size;
        let Some(slot) = self.slots.get_mut(idx) else {
            return false;
        };
        if slot.reference.is_some() || !region.is_valid() {
            return false;
        }
        let Some(volume_region) = slot.volume.as_ref().map(|v| *v.region()) else {
            return false;
        };

        let grown = region.grow(1);
        let first = grown.mins().div_euclid(IVec3::splat(mesh_size));
        let last = grown.maxs().div_euclid(IVec3::splat(mesh_size));
        let mut queued = 0;
        for tile in Region::new(first, last).positions() {
            let tile_region = Region::cube(tile * mesh_size, mesh_size);
            if !tile_region.intersects(&volume_region) {
                if slot.tiles.remove(&tile_key(tile_region.mins())).is_some() {
                    slot.dirty = true;
                }
                continue;
            }
            let item = ExtractRegion::new(tile_region, idx, slot.generation, slot.hidden);
            if self.queue.push(item) {
                queued += 1;
            }
        }
        log::trace!("Slot {idx}: queued {queued} tiles for {region}");
        true
    }

    /// Queue the slot's whole volume
    pub fn extract_volume(&mut self, idx: usize) -> bool {
        match self.volume(idx).map(|v| *v.region()) {
            Some(region) => self.extract_region(idx, &region),
            None => false,
        }
    }

    /// Hand up to `max` queued requests to the workers.
    ///
    /// Stale requests are skipped; requests whose snapshot holds only air
    /// produce an empty mesh without a worker task. Returns the number of
    /// requests processed.
    pub fn schedule_extractions(&mut self, max: usize) -> usize {
        let mut processed = 0;
        while processed < max {
            let Some(item) = self.queue.pop() else {
                break;
            };
            let Some(slot) = self.slots.get_mut(item.slot) else {
                continue;
            };
            if item.generation != slot.generation {
                log::trace!(
                    "Skipping stale extraction of {} for slot {}",
                    item.region,
                    item.slot
                );
                continue;
            }
            let Some(volume) = slot.volume.as_ref() else {
                continue;
            };
            processed += 1;

            let sequence = self.next_sequence;
            self.next_sequence += 1;
            slot.latest.insert(tile_key(item.region.mins()), sequence);

            let (snapshot, only_air) = volume.copy_region(&item.region.grow(EXTRACTION_BORDER));
            if only_air {
                self.scheduler.push_empty(item.slot, item.generation, sequence, item.region);
                continue;
            }
            self.scheduler.dispatch(ExtractionJob {
                slot: item.slot,
                generation: item.generation,
                sequence,
                region: item.region,
                volume: snapshot,
                palette: slot.palette.clone(),
                mode: self.mesh_mode,
            });
        }
        processed
    }

    /// Move finished meshes into their slots; returns the number applied.
    ///
    /// A result is dropped if its slot was reset since dispatch, or if a newer
    /// extraction of the same tile has been dispatched in the meantime.
    pub fn apply_results(&mut self) -> usize {
        let mut applied = 0;
        while let Some(result) = self.scheduler.pop_result() {
            let Some(slot) = self.slots.get_mut(result.slot) else {
                continue;
            };
            if result.generation != slot.generation {
                log::trace!("Dropping stale mesh for slot {}", result.slot);
                continue;
            }
            let key = tile_key(result.region.mins());
            if slot.latest.get(&key).is_some_and(|&latest| result.sequence < latest) {
                log::trace!(
                    "Dropping superseded mesh of {} for slot {}",
                    result.region,
                    result.slot
                );
                continue;
            }
            if result.mesh.is_empty() {
                slot.tiles.remove(&key);
            } else {
                slot.tiles.insert(key, result.mesh);
            }
            slot.dirty = true;
            applied += 1;
        }
        applied
    }

    /// Slots whose host meshes changed since the previous call
    pub fn take_dirty_slots(&mut self) -> Vec<usize> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, slot)| std::mem::take(&mut slot.dirty).then_some(idx))
            .collect()
    }

    /// All tiles of one mesh type concatenated in tile order
    pub fn build_mesh(&self, idx: usize, mesh_type: MeshType) -> Mesh {
        let mut mesh = Mesh::new();
        if let Some(slot) = self.slots.get(idx) {
            for tile in slot.tiles.values() {
                mesh.append(tile.get(mesh_type));
            }
        }
        mesh
    }

    pub fn tile_count(&self, idx: usize) -> usize {
        self.slots.get(idx).map_or(0, |slot| slot.tiles.len())
    }

    /// Mesh of the tile whose minimum corner is `tile_mins`
    pub fn tile_mesh(&self, idx: usize, tile_mins: IVec3) -> Option<&ExtractedMesh> {
        self.slots.get(idx)?.tiles.get(&tile_key(tile_mins))
    }

    pub fn wait_for_pending_extractions(&self) {
        self.scheduler.wait_for_pending();
    }

    /// Abort outstanding worker tasks and discard their results
    pub fn clear_pending_extractions(&self) {
        self.scheduler.clear_pending();
    }

    /// Queued extraction requests
    pub fn pending_extractions(&self) -> usize {
        self.queue.len()
    }

    pub fn scheduler(&self) -> &ExtractionScheduler {
        &self.scheduler
    }

    pub fn mesh_size(&self) -> i32 {
        self.mesh_size
    }

    pub fn mesh_mode(&self) -> MeshMode {
        self.mesh_mode
    }

    /// Switch the surface representation; returns true if it changed
    pub fn set_mesh_mode(&mut self, mode: MeshMode) -> bool {
        if self.mesh_mode == mode {
            return false;
        }
        self.mesh_mode = mode;
        true
    }

    /// Drop all meshes and requeue every visible volume. Hidden volumes are
    /// requeued when they become visible.
    pub fn reset_meshes(&mut self) {
        self.clear_pending_extractions();
        self.queue.clear();
        let mut requeue = Vec::new();
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            slot.generation += 1;
            slot.latest.clear();
            if !slot.tiles.is_empty() {
                slot.tiles.clear();
                slot.dirty = true;
            }
            if slot.volume.is_none() || slot.reference.is_some() {
                continue;
            }
            if slot.hidden {
                slot.needs_full_extraction = true;
            } else {
                requeue.push(idx);
            }
        }
        for idx in requeue {
            self.extract_volume(idx);
        }
    }

    /// Follow reference links to the slot owning the meshes
    pub fn resolve_idx(&self, idx: usize) -> usize {
        let mut current = idx;
        let mut visited = HashSet::new();
        while let Some(next) = self.slots.get(current).and_then(|slot| slot.reference) {
            if !visited.insert(current) {
                log::error!("Reference cycle at slot {idx}");
                return idx;
            }
            current = next;
        }
        current
    }

    /// Make slot `idx` draw the meshes of `reference` (or its own with `None`)
    pub fn set_reference(&mut self, idx: usize, reference: Option<usize>) -> Result<()> {
        if let Some(target) = reference {
            self.slot(target)?;
        }
        let slot = self.slot_mut(idx)?;
        slot.reference = reference.filter(|&target| target != idx);
        if slot.reference.is_some() && !slot.tiles.is_empty() {
            slot.tiles.clear();
            slot.dirty = true;
        }
        slot.generation += 1;
        slot.latest.clear();
        Ok(())
    }

    pub fn reference(&self, idx: usize) -> Option<usize> {
        self.slots.get(idx)?.reference
    }

    pub fn set_model_matrix(&mut self, idx: usize, model: Mat4, pivot: Vec3) -> Result<()> {
        let slot = self.slot_mut(idx)?;
        slot.model = model;
        slot.pivot = pivot;
        Ok(())
    }

    pub fn model_matrix(&self, idx: usize) -> Mat4 {
        self.slots.get(idx).map_or(Mat4::IDENTITY, |slot| slot.model)
    }

    pub fn pivot(&self, idx: usize) -> Vec3 {
        self.slots.get(idx).map_or(Vec3::ZERO, |slot| slot.pivot)
    }

    /// Model matrix applied around the pivot
    pub fn transform(&self, idx: usize) -> Mat4 {
        self.model_matrix(idx) * Mat4::from_translation(-self.pivot(idx))
    }

    /// Show or hide a slot. Showing a slot whose meshes were dropped while
    /// hidden queues its whole volume.
    pub fn set_hidden(&mut self, idx: usize, hidden: bool) -> Result<()> {
        let slot = self.slot_mut(idx)?;
        slot.hidden = hidden;
        if !hidden && std::mem::take(&mut slot.needs_full_extraction) {
            self.extract_volume(idx);
        }
        Ok(())
    }

    pub fn hidden(&self, idx: usize) -> bool {
        self.slots.get(idx).is_some_and(|slot| slot.hidden)
    }

    pub fn set_gray(&mut self, idx: usize, gray: bool) -> Result<()> {
        self.slot_mut(idx)?.gray = gray;
        Ok(())
    }

    pub fn gray(&self, idx: usize) -> bool {
        self.slots.get(idx).is_some_and(|slot| slot.gray)
    }

    pub fn set_culled(&mut self, idx: usize, culled: bool) {
        if let Some(slot) = self.slots.get_mut(idx) {
            slot.culled = culled;
        }
    }

    pub fn culled(&self, idx: usize) -> bool {
        self.slots.get(idx).is_some_and(|slot| slot.culled)
    }

    /// True if the slot, or the slot it references, has a volume
    pub fn has_renderable_volume(&self, idx: usize) -> bool {
        self.volume(self.resolve_idx(idx)).is_some()
    }

    /// World-space bounds of the volume drawn by slot `idx`
    pub fn world_bounds(&self, idx: usize) -> Option<Aabb> {
        let volume = self.volume(self.resolve_idx(idx))?;
        Some(Aabb::from_region(volume.region()).transformed(&self.transform(idx)))
    }

    /// Detach every volume and drop all meshes and pending work.
    ///
    /// Returns the detached volumes with their slot index.
    pub fn clear(&mut self) -> Vec<(usize, RawVolume)> {
        self.clear_pending_extractions();
        self.queue.clear();
        let mut volumes = Vec::new();
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            let generation = slot.generation + 1;
            if let Some(volume) = std::mem::take(slot).volume {
                volumes.push((idx, volume));
            }
            slot.generation = generation;
        }
        volumes
    }

    pub fn shutdown(&mut self) -> Vec<(usize, RawVolume)> {
        let volumes = self.clear();
        log::info!("Mesh state shut down, released {} volumes", volumes.len());
        volumes
    }
}
