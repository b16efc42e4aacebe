//! Region-restricted access to a [`PagedVolume`] and a cursor-style sampler

use crate::core::types::IVec3;
use crate::math::Region;
use crate::voxel::Voxel;
use super::paged_volume::PagedVolume;

/// View of a paged volume limited to a region.
///
/// Reads outside the region return the border voxel and writes outside it are
/// rejected, so an editor operating on a bounded scene node cannot spill into
/// the rest of the volume.
pub struct PagedVolumeWrapper<'a> {
    volume: &'a mut PagedVolume,
    region: Region,
}

impl<'a> PagedVolumeWrapper<'a> {
    pub fn new(volume: &'a mut PagedVolume, region: Region) -> Self {
        Self { volume, region }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn volume(&mut self) -> &mut PagedVolume {
        self.volume
    }

    pub fn voxel(&mut self, x: i32, y: i32, z: i32) -> Voxel {
        self.voxel_at(IVec3::new(x, y, z))
    }

    pub fn voxel_at(&mut self, pos: IVec3) -> Voxel {
        if !self.region.contains_point(pos) {
            return self.volume.border_voxel();
        }
        self.volume.voxel_at(pos)
    }

    pub fn set_voxel(&mut self, x: i32, y: i32, z: i32, voxel: Voxel) -> bool {
        self.set_voxel_at(IVec3::new(x, y, z), voxel)
    }

    pub fn set_voxel_at(&mut self, pos: IVec3, voxel: Voxel) -> bool {
        if !self.region.contains_point(pos) {
            return false;
        }
        self.volume.set_voxel_at(pos, voxel)
    }

    /// Cursor starting at the region minimum
    pub fn sampler(&mut self) -> Sampler<'_, 'a> {
        let position = self.region.mins();
        Sampler { wrapper: self, position }
    }
}

/// Movable cursor over a [`PagedVolumeWrapper`]
pub struct Sampler<'w, 'a> {
    wrapper: &'w mut PagedVolumeWrapper<'a>,
    position: IVec3,
}

impl Sampler<'_, '_> {
    pub fn set_position(&mut self, x: i32, y: i32, z: i32) {
        self.position = IVec3::new(x, y, z);
    }

    pub fn position(&self) -> IVec3 {
        self.position
    }

    /// True if the cursor lies inside the wrapper's region
    pub fn current_position_valid(&self) -> bool {
        self.wrapper.region.contains_point(self.position)
    }

    pub fn voxel(&mut self) -> Voxel {
        self.wrapper.voxel_at(self.position)
    }

    pub fn set_voxel(&mut self, voxel: Voxel) -> bool {
        self.wrapper.set_voxel_at(self.position, voxel)
    }

    pub fn move_by(&mut self, offset: IVec3) {
        self.position += offset;
    }

    pub fn move_positive_x(&mut self) {
        self.position.x += 1;
    }

    pub fn move_negative_x(&mut self) {
        self.position.x -= 1;
    }

    pub fn move_positive_y(&mut self) {
        self.position.y += 1;
    }

    pub fn move_negative_y(&mut self) {
        self.position.y -= 1;
    }

    pub fn move_positive_z(&mut self) {
        self.position.z += 1;
    }

    pub fn move_negative_z(&mut self) {
        self.position.z -= 1;
    }
}
