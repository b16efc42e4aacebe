//! Fixed-size cubic blocks of voxel data, the paging unit of a [`PagedVolume`]
//!
//! [`PagedVolume`]: super::PagedVolume

use rkyv::{Archive, Deserialize, Serialize};

use crate::core::types::IVec3;
use crate::math::Region;
use crate::voxel::Voxel;

/// Integer coordinate identifying a chunk in the chunk grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Archive, Deserialize, Serialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing the voxel at `pos` for chunks of `1 << side_power` voxels.
    ///
    /// Arithmetic shift floors, so -1 maps to chunk -1 rather than 0.
    pub fn from_world(pos: IVec3, side_power: u32) -> Self {
        Self {
            x: pos.x >> side_power,
            y: pos.y >> side_power,
            z: pos.z >> side_power,
        }
    }

    /// World position of the minimum corner voxel
    pub fn origin(&self, side_power: u32) -> IVec3 {
        IVec3::new(self.x << side_power, self.y << side_power, self.z << side_power)
    }

    /// World region covered by this chunk
    pub fn region(&self, side_power: u32) -> Region {
        Region::cube(self.origin(side_power), 1 << side_power)
    }

    pub fn as_ivec3(&self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A resident chunk
#[derive(Clone, Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    side_power: u32,
    voxels: Vec<Voxel>,
    /// Modified since it was paged in
    dirty: bool,
    /// Access tick of the owning volume when this chunk was last used
    last_touched: u64,
}

impl Chunk {
    /// Allocate an all-air chunk; `None` if the allocation fails
    pub fn try_new(coord: ChunkCoord, side_power: u32) -> Option<Self> {
        let count = 1usize << (3 * side_power);
        let mut voxels = Vec::new();
        voxels.try_reserve_exact(count).ok()?;
        voxels.resize(count, Voxel::AIR);
        Some(Self {
            coord,
            side_power,
            voxels,
            dirty: false,
            last_touched: 0,
        })
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Voxels per side
    pub fn side_length(&self) -> u32 {
        1 << self.side_power
    }

    pub fn side_power(&self) -> u32 {
        self.side_power
    }

    /// World region covered by this chunk
    pub fn region(&self) -> Region {
        self.coord.region(self.side_power)
    }

    fn local_index(&self, local: IVec3) -> usize {
        let side = self.side_length() as usize;
        local.x as usize + side * (local.y as usize + side * local.z as usize)
    }

    fn world_to_local(&self, pos: IVec3) -> IVec3 {
        pos & IVec3::splat(self.side_length() as i32 - 1)
    }

    /// Voxel at chunk-local coordinates
    pub fn voxel_local(&self, x: u32, y: u32, z: u32) -> Voxel {
        self.voxels[self.local_index(IVec3::new(x as i32, y as i32, z as i32))]
    }

    /// Set voxel at chunk-local coordinates
    pub fn set_voxel_local(&mut self, x: u32, y: u32, z: u32, voxel: Voxel) {
        let index = self.local_index(IVec3::new(x as i32, y as i32, z as i32));
        self.voxels[index] = voxel;
        self.dirty = true;
    }

    /// Voxel at a world position known to lie in this chunk
    pub fn voxel_at(&self, pos: IVec3) -> Voxel {
        self.voxels[self.local_index(self.world_to_local(pos))]
    }

    /// Set voxel at a world position known to lie in this chunk
    pub fn set_voxel_at(&mut self, pos: IVec3, voxel: Voxel) {
        let index = self.local_index(self.world_to_local(pos));
        self.voxels[index] = voxel;
        self.dirty = true;
    }

    pub fn fill(&mut self, voxel: Voxel) {
        self.voxels.fill(voxel);
        self.dirty = true;
    }

    /// Voxel storage, x fastest
    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// Replace the voxel storage; returns false if the length does not match
    pub fn load_voxels(&mut self, voxels: &[Voxel]) -> bool {
        if voxels.len() != self.voxels.len() {
            return false;
        }
        self.voxels.copy_from_slice(voxels);
        self.dirty = true;
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn is_only_air(&self) -> bool {
        self.voxels.iter().all(Voxel::is_air)
    }

    pub fn last_touched(&self) -> u64 {
        self.last_touched
    }

    pub(crate) fn touch(&mut self, tick: u64) {
        self.last_touched = tick;
    }

    /// Bytes held by the voxel array
    pub fn size_in_bytes(&self) -> usize {
        Self::bytes_for_side_power(self.side_power)
    }

    pub fn bytes_for_side_power(side_power: u32) -> usize {
        (1usize << (3 * side_power)) * std::mem::size_of::<Voxel>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_world_floors_negative() {
        assert_eq!(ChunkCoord::from_world(IVec3::new(0, 31, 32), 5), ChunkCoord::new(0, 0, 1));
        assert_eq!(
            ChunkCoord::from_world(IVec3::new(-1, -32, -33), 5),
            ChunkCoord::new(-1, -1, -2)
        );
    }

    #[test]
    fn test_origin_plus_local_reconstructs_position() {
        let power = 4;
        for x in [-100, -17, -16, -1, 0, 1, 15, 16, 99] {
            for y in [-33, 0, 7] {
                let pos = IVec3::new(x, y, -x);
                let coord = ChunkCoord::from_world(pos, power);
                let local = pos & IVec3::splat((1 << power) - 1);
                assert!(local.cmpge(IVec3::ZERO).all() && local.cmplt(IVec3::splat(16)).all());
                assert_eq!(coord.origin(power) + local, pos);
                assert!(coord.region(power).contains_point(pos));
            }
        }
    }

    #[test]
    fn test_chunk_set_marks_dirty() {
        let mut chunk = Chunk::try_new(ChunkCoord::new(-1, 0, 0), 3).unwrap();
        assert!(!chunk.is_dirty());
        assert!(chunk.is_only_air());

        chunk.set_voxel_at(IVec3::new(-1, 2, 3), Voxel::generic(4));
        assert!(chunk.is_dirty());
        assert_eq!(chunk.voxel_local(7, 2, 3), Voxel::generic(4));
        assert_eq!(chunk.voxel_at(IVec3::new(-1, 2, 3)), Voxel::generic(4));

        chunk.mark_clean();
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn test_chunk_size() {
        let chunk = Chunk::try_new(ChunkCoord::new(0, 0, 0), 5).unwrap();
        assert_eq!(chunk.side_length(), 32);
        assert_eq!(chunk.voxels().len(), 32 * 32 * 32);
        assert_eq!(chunk.size_in_bytes(), 32 * 32 * 32 * 4);
        assert_eq!(chunk.region(), Region::from_coords(0, 0, 0, 31, 31, 31));
    }

    #[test]
    fn test_load_voxels_rejects_wrong_length() {
        let mut chunk = Chunk::try_new(ChunkCoord::new(0, 0, 0), 1).unwrap();
        assert!(!chunk.load_voxels(&[Voxel::AIR; 3]));
        assert!(chunk.load_voxels(&[Voxel::generic(1); 8]));
        assert_eq!(chunk.voxel_local(1, 1, 1), Voxel::generic(1));
    }
}
