//! Unbounded voxel grid backed by a bounded set of resident chunks
//!
//! Chunks are faulted in through a [`Pager`] on first access and paged out in
//! least-recently-used order once the configured budget is reached. Recency is
//! tracked by an [`LruCache`] so promotion and eviction are O(1).

use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::core::types::IVec3;
use crate::core::{Error, Result};
use crate::math::Region;
use crate::voxel::{RawVolume, Voxel};
use super::budget::MemoryBudget;
use super::chunk::{Chunk, ChunkCoord};
use super::pager::Pager;

/// Largest supported chunk edge
pub const MAX_CHUNK_SIDE_LENGTH: u32 = 256;

/// How much chunk data may stay resident
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkBudget {
    /// Approximate byte limit, converted into a chunk count
    Bytes(usize),
    /// Exact number of resident chunks
    Chunks(usize),
}

impl Default for ChunkBudget {
    fn default() -> Self {
        ChunkBudget::Bytes(256 * 1024 * 1024)
    }
}

/// Paged volume configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagedVolumeConfig {
    /// Voxels per chunk side, a power of two
    pub chunk_side_length: u32,
    pub memory_budget: ChunkBudget,
}

impl Default for PagedVolumeConfig {
    fn default() -> Self {
        Self {
            chunk_side_length: 32,
            memory_budget: ChunkBudget::default(),
        }
    }
}

impl PagedVolumeConfig {
    pub fn validate(&self) -> Result<()> {
        let side = self.chunk_side_length;
        if !side.is_power_of_two() || side > MAX_CHUNK_SIDE_LENGTH {
            return Err(Error::InvalidConfig(format!(
                "chunk_side_length must be a power of two up to {MAX_CHUNK_SIDE_LENGTH}, got {side}"
            )));
        }
        Ok(())
    }

    /// Number of chunks the budget allows (at least one)
    pub fn chunk_count_limit(&self) -> usize {
        let power = self.chunk_side_length.trailing_zeros();
        let limit = match self.memory_budget {
            ChunkBudget::Bytes(bytes) => bytes / Chunk::bytes_for_side_power(power),
            ChunkBudget::Chunks(count) => count,
        };
        limit.max(1)
    }
}

/// Paged voxel volume
pub struct PagedVolume {
    /// Resident chunks, most recently used first
    chunks: LruCache<ChunkCoord, Chunk>,
    pager: Box<dyn Pager>,
    side_power: u32,
    chunk_count_limit: usize,
    budget: MemoryBudget,
    /// Monotonic access counter stamped on touched chunks
    tick: u64,
    /// Union of all positions written since the last `take_dirty_region`
    dirty_region: Region,
    border: Voxel,
}

impl PagedVolume {
    /// Create an empty volume that pages chunks through `pager`
    pub fn new(config: &PagedVolumeConfig, pager: Box<dyn Pager>) -> Result<Self> {
        config.validate()?;
        let side_power = config.chunk_side_length.trailing_zeros();
        let chunk_count_limit = config.chunk_count_limit();
        let budget_bytes =
            chunk_count_limit.saturating_mul(Chunk::bytes_for_side_power(side_power));
        let budget = MemoryBudget::new(budget_bytes);
        log::debug!(
            "Created paged volume: chunk side {}, limit {} chunks ({} bytes)",
            config.chunk_side_length,
            chunk_count_limit,
            budget.budget()
        );
        Ok(Self {
            chunks: LruCache::unbounded(),
            pager,
            side_power,
            chunk_count_limit,
            budget,
            tick: 0,
            dirty_region: Region::INVALID,
            border: Voxel::AIR,
        })
    }

    pub fn chunk_side_length(&self) -> u32 {
        1 << self.side_power
    }

    pub fn chunk_count_limit(&self) -> usize {
        self.chunk_count_limit
    }

    pub fn resident_chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Bytes held by resident chunks
    pub fn calculate_size_in_bytes(&self) -> usize {
        self.budget.used()
    }

    /// Resident bytes relative to the budget
    pub fn memory_pressure(&self) -> f32 {
        self.budget.pressure()
    }

    /// Voxel returned for positions that cannot be resolved
    pub fn border_voxel(&self) -> Voxel {
        self.border
    }

    pub fn set_border_voxel(&mut self, voxel: Voxel) {
        self.border = voxel;
    }

    /// Chunk coordinate containing `pos`
    pub fn chunk_coord(&self, pos: IVec3) -> ChunkCoord {
        ChunkCoord::from_world(pos, self.side_power)
    }

    pub fn is_resident(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains(&coord)
    }

    /// Resident chunk coordinates, most recently used first
    pub fn resident_coords(&self) -> impl Iterator<Item = ChunkCoord> {
        self.chunks.iter().map(|(coord, _)| *coord)
    }

    /// Coordinates of all chunks overlapping `region`, resident or not
    pub fn chunks_in_region(&self, region: &Region) -> impl Iterator<Item = ChunkCoord> + use<> {
        let chunk_region = if region.is_valid() {
            Region::new(
                self.chunk_coord(region.mins()).as_ivec3(),
                self.chunk_coord(region.maxs()).as_ivec3(),
            )
        } else {
            Region::INVALID
        };
        chunk_region.positions().map(|p| ChunkCoord::new(p.x, p.y, p.z))
    }

    pub fn voxel(&mut self, x: i32, y: i32, z: i32) -> Voxel {
        self.voxel_at(IVec3::new(x, y, z))
    }

    /// Read a voxel, paging its chunk in if necessary
    pub fn voxel_at(&mut self, pos: IVec3) -> Voxel {
        let border = self.border;
        self.chunk(pos).map_or(border, |chunk| chunk.voxel_at(pos))
    }

    /// Read a voxel without paging or touching; non-resident positions return the border voxel
    pub fn peek_voxel(&self, pos: IVec3) -> Voxel {
        self.chunks
            .peek(&self.chunk_coord(pos))
            .map_or(self.border, |chunk| chunk.voxel_at(pos))
    }

    pub fn set_voxel(&mut self, x: i32, y: i32, z: i32, voxel: Voxel) -> bool {
        self.set_voxel_at(IVec3::new(x, y, z), voxel)
    }

    /// Write a voxel, paging its chunk in if necessary.
    ///
    /// Returns false if the chunk could not be allocated.
    pub fn set_voxel_at(&mut self, pos: IVec3, voxel: Voxel) -> bool {
        let Some(chunk) = self.chunk(pos) else {
            return false;
        };
        chunk.set_voxel_at(pos, voxel);
        self.dirty_region.accumulate(pos);
        true
    }

    /// Chunk containing `pos`, paged in and marked most recently used
    pub fn chunk(&mut self, pos: IVec3) -> Option<&mut Chunk> {
        let coord = self.chunk_coord(pos);
        self.tick += 1;
        let tick = self.tick;
        if !self.chunks.contains(&coord) && !self.page_in(coord) {
            return None;
        }
        let chunk = self.chunks.get_mut(&coord)?;
        chunk.touch(tick);
        Some(chunk)
    }

    fn page_in(&mut self, coord: ChunkCoord) -> bool {
        while self.chunks.len() >= self.chunk_count_limit {
            if !self.evict_least_recently_used() {
                break;
            }
        }

        let Some(mut chunk) = Chunk::try_new(coord, self.side_power) else {
            log::error!("Failed to allocate chunk {coord}");
            return false;
        };
        let region = chunk.region();
        if !self.pager.page_in(&region, &mut chunk) {
            log::debug!("Pager failed to page in chunk {coord}, leaving it empty");
            chunk.fill(Voxel::AIR);
        }
        chunk.mark_clean();

        self.budget.add(chunk.size_in_bytes());
        self.chunks.push(coord, chunk);
        log::trace!("Paged in chunk {coord} ({} resident)", self.chunks.len());
        true
    }

    /// Page out the least recently used chunk; false if nothing is resident
    fn evict_least_recently_used(&mut self) -> bool {
        let Some((coord, chunk)) = self.chunks.pop_lru() else {
            return false;
        };
        self.pager.page_out(&chunk.region(), &chunk);
        self.budget.remove(chunk.size_in_bytes());
        log::trace!("Evicted chunk {coord}");
        true
    }

    /// Page out every resident chunk and clear the chunk table
    pub fn flush_all(&mut self) {
        let count = self.chunks.len();
        while self.evict_least_recently_used() {}
        if count > 0 {
            log::debug!("Flushed {count} chunks");
        }
    }

    /// Region written since the previous call, if any
    pub fn take_dirty_region(&mut self) -> Option<Region> {
        let region = std::mem::replace(&mut self.dirty_region, Region::INVALID);
        region.is_valid().then_some(region)
    }

    /// Materialize `region` into a dense volume, paging chunks as needed
    pub fn copy_region(&mut self, region: &Region) -> RawVolume {
        let mut volume = RawVolume::new(*region);
        for pos in region.positions() {
            let voxel = self.voxel_at(pos);
            if voxel.is_blocked() {
                volume.set_voxel_at(pos, voxel);
            }
        }
        volume
    }
}

impl Drop for PagedVolume {
    fn drop(&mut self) {
        self.flush_all();
    }
}

impl std::fmt::Debug for PagedVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedVolume")
            .field("chunk_side_length", &self.chunk_side_length())
            .field("resident", &self.chunks.len())
            .field("limit", &self.chunk_count_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paged::EmptyPager;
    use std::sync::{Arc, Mutex};

    /// Records page-in and page-out calls; optionally fails page-in
    #[derive(Default)]
    struct RecordingPager {
        paged_in: Arc<Mutex<Vec<ChunkCoord>>>,
        paged_out: Arc<Mutex<Vec<(ChunkCoord, bool)>>>,
        fail_page_in: bool,
    }

    impl Pager for RecordingPager {
        fn page_in(&mut self, _region: &Region, chunk: &mut Chunk) -> bool {
            self.paged_in.lock().unwrap().push(chunk.coord());
            if self.fail_page_in {
                chunk.fill(Voxel::generic(99));
                return false;
            }
            true
        }

        fn page_out(&mut self, _region: &Region, chunk: &Chunk) {
            self.paged_out.lock().unwrap().push((chunk.coord(), chunk.is_dirty()));
        }
    }

    fn config(chunks: usize) -> PagedVolumeConfig {
        PagedVolumeConfig {
            chunk_side_length: 32,
            memory_budget: ChunkBudget::Chunks(chunks),
        }
    }

    #[test]
    fn test_budget_of_two_chunks_evicts_first() {
        let pager = RecordingPager::default();
        let paged_out = pager.paged_out.clone();
        let mut volume = PagedVolume::new(&config(2), Box::new(pager)).unwrap();

        assert!(volume.set_voxel(0, 0, 0, Voxel::generic(1)));
        assert!(volume.set_voxel(100, 0, 0, Voxel::generic(2)));
        assert!(volume.set_voxel(200, 0, 0, Voxel::generic(3)));

        assert_eq!(volume.resident_chunk_count(), 2);
        assert!(!volume.is_resident(ChunkCoord::new(0, 0, 0)));
        assert!(volume.is_resident(ChunkCoord::new(3, 0, 0)));
        assert!(volume.is_resident(ChunkCoord::new(6, 0, 0)));
        assert_eq!(*paged_out.lock().unwrap(), vec![(ChunkCoord::new(0, 0, 0), true)]);
    }

    #[test]
    fn test_resident_count_never_exceeds_budget() {
        let mut volume = PagedVolume::new(&config(3), Box::new(EmptyPager)).unwrap();
        for i in -20..20 {
            volume.set_voxel(i * 32, (i % 3) * 32, 0, Voxel::generic(1));
            assert!(volume.resident_chunk_count() <= 3);
        }
        assert_eq!(volume.calculate_size_in_bytes(), 3 * 32 * 32 * 32 * 4);
    }

    #[test]
    fn test_access_promotes_chunk() {
        let pager = RecordingPager::default();
        let paged_out = pager.paged_out.clone();
        let mut volume = PagedVolume::new(&config(2), Box::new(pager)).unwrap();

        volume.set_voxel(0, 0, 0, Voxel::generic(1));
        volume.set_voxel(40, 0, 0, Voxel::generic(1));
        // Reading chunk 0 makes chunk 1 the least recently used
        assert_eq!(volume.voxel(0, 0, 0), Voxel::generic(1));
        volume.voxel(80, 0, 0);

        assert!(volume.is_resident(ChunkCoord::new(0, 0, 0)));
        assert_eq!(paged_out.lock().unwrap()[0].0, ChunkCoord::new(1, 0, 0));
    }

    #[test]
    fn test_negative_coordinates() {
        let mut volume = PagedVolume::new(&config(8), Box::new(EmptyPager)).unwrap();
        volume.set_voxel(-1, -1, -1, Voxel::generic(7));
        assert!(volume.is_resident(ChunkCoord::new(-1, -1, -1)));
        assert!(!volume.is_resident(ChunkCoord::new(0, 0, 0)));
        assert_eq!(volume.voxel(-1, -1, -1), Voxel::generic(7));
        assert!(volume.voxel(-2, -1, -1).is_air());
    }

    #[test]
    fn test_failed_page_in_reads_as_air() {
        let pager = RecordingPager {
            fail_page_in: true,
            ..Default::default()
        };
        let mut volume = PagedVolume::new(&config(2), Box::new(pager)).unwrap();
        assert!(volume.voxel(5, 5, 5).is_air());
        assert_eq!(volume.resident_chunk_count(), 1);
    }

    #[test]
    fn test_clean_chunks_report_clean_on_page_out() {
        let pager = RecordingPager::default();
        let paged_out = pager.paged_out.clone();
        let mut volume = PagedVolume::new(&config(1), Box::new(pager)).unwrap();
        volume.voxel(0, 0, 0);
        volume.voxel(32, 0, 0);
        assert_eq!(*paged_out.lock().unwrap(), vec![(ChunkCoord::new(0, 0, 0), false)]);
    }

    #[test]
    fn test_flush_all_pages_out_everything() {
        let pager = RecordingPager::default();
        let paged_out = pager.paged_out.clone();
        let mut volume = PagedVolume::new(&config(4), Box::new(pager)).unwrap();
        volume.set_voxel(0, 0, 0, Voxel::generic(1));
        volume.set_voxel(0, 64, 0, Voxel::generic(1));

        volume.flush_all();
        assert_eq!(volume.resident_chunk_count(), 0);
        assert_eq!(volume.calculate_size_in_bytes(), 0);
        assert_eq!(paged_out.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_drop_flushes() {
        let pager = RecordingPager::default();
        let paged_out = pager.paged_out.clone();
        {
            let mut volume = PagedVolume::new(&config(4), Box::new(pager)).unwrap();
            volume.set_voxel(1, 2, 3, Voxel::generic(1));
        }
        assert_eq!(paged_out.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_peek_does_not_page() {
        let pager = RecordingPager::default();
        let paged_in = pager.paged_in.clone();
        let mut volume = PagedVolume::new(&config(4), Box::new(pager)).unwrap();
        assert!(volume.peek_voxel(IVec3::new(3, 3, 3)).is_air());
        assert!(paged_in.lock().unwrap().is_empty());

        volume.set_voxel(3, 3, 3, Voxel::generic(2));
        assert_eq!(volume.peek_voxel(IVec3::new(3, 3, 3)), Voxel::generic(2));
    }

    #[test]
    fn test_dirty_region_accumulates() {
        let mut volume = PagedVolume::new(&config(8), Box::new(EmptyPager)).unwrap();
        assert_eq!(volume.take_dirty_region(), None);
        volume.set_voxel(1, 2, 3, Voxel::generic(1));
        volume.set_voxel(-4, 5, 0, Voxel::generic(1));
        assert_eq!(volume.take_dirty_region(), Some(Region::from_coords(-4, 2, 0, 1, 5, 3)));
        assert_eq!(volume.take_dirty_region(), None);
    }

    #[test]
    fn test_chunks_in_region() {
        let volume = PagedVolume::new(&config(8), Box::new(EmptyPager)).unwrap();
        let coords: Vec<_> = volume
            .chunks_in_region(&Region::from_coords(-1, 0, 0, 32, 0, 0))
            .collect();
        assert_eq!(
            coords,
            vec![ChunkCoord::new(-1, 0, 0), ChunkCoord::new(0, 0, 0), ChunkCoord::new(1, 0, 0)]
        );
    }

    #[test]
    fn test_copy_region() {
        let mut volume = PagedVolume::new(&config(8), Box::new(EmptyPager)).unwrap();
        volume.set_voxel(31, 0, 0, Voxel::generic(1));
        volume.set_voxel(32, 0, 0, Voxel::generic(2));
        let raw = volume.copy_region(&Region::from_coords(30, 0, 0, 33, 0, 0));
        assert_eq!(raw.voxel(31, 0, 0), Voxel::generic(1));
        assert_eq!(raw.voxel(32, 0, 0), Voxel::generic(2));
        assert_eq!(raw.solid_count(), 2);
    }

    #[test]
    fn test_byte_budget_converts_to_chunks() {
        let config = PagedVolumeConfig {
            chunk_side_length: 16,
            memory_budget: ChunkBudget::Bytes(16 * 16 * 16 * 4 * 5 + 10),
        };
        assert_eq!(config.chunk_count_limit(), 5);
        let tiny = PagedVolumeConfig {
            chunk_side_length: 16,
            memory_budget: ChunkBudget::Bytes(1),
        };
        assert_eq!(tiny.chunk_count_limit(), 1);
    }

    #[test]
    fn test_unbounded_chunk_budget() {
        let config = PagedVolumeConfig {
            chunk_side_length: 32,
            memory_budget: ChunkBudget::Chunks(usize::MAX),
        };
        let mut volume = PagedVolume::new(&config, Box::new(EmptyPager)).unwrap();
        assert_eq!(volume.chunk_count_limit(), usize::MAX);
        assert!(volume.set_voxel(0, 0, 0, Voxel::generic(1)));
        assert!(volume.memory_pressure() < 1.0);
    }

    #[test]
    fn test_rejects_invalid_side_length() {
        let config = PagedVolumeConfig {
            chunk_side_length: 48,
            ..Default::default()
        };
        assert!(matches!(
            PagedVolume::new(&config, Box::new(EmptyPager)),
            Err(Error::InvalidConfig(_))
        ));
    }
}
