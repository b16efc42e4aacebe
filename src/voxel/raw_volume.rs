//! Dense, bounded voxel volume

use crate::core::types::IVec3;
use crate::math::Region;
use super::voxel::Voxel;

/// Fully materialized voxel grid covering a fixed [`Region`].
///
/// Reads outside the region return the border voxel (air by default); writes
/// outside the region are rejected.
#[derive(Clone, Debug, PartialEq)]
pub struct RawVolume {
    region: Region,
    voxels: Vec<Voxel>,
    border: Voxel,
}

impl RawVolume {
    /// Create an all-air volume. An invalid region yields a volume without storage.
    pub fn new(region: Region) -> Self {
        Self {
            region,
            voxels: vec![Voxel::AIR; region.voxel_count()],
            border: Voxel::AIR,
        }
    }

    /// Wrap existing voxel data laid out x-fastest; `None` if the length does not match
    pub fn from_voxels(region: Region, voxels: Vec<Voxel>) -> Option<Self> {
        if voxels.len() != region.voxel_count() {
            return None;
        }
        Some(Self { region, voxels, border: Voxel::AIR })
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    pub fn border_voxel(&self) -> Voxel {
        self.border
    }

    pub fn set_border_voxel(&mut self, voxel: Voxel) {
        self.border = voxel;
    }

    fn index(&self, p: IVec3) -> Option<usize> {
        if !self.region.contains_point(p) {
            return None;
        }
        let local = p - self.region.mins();
        let dims = self.region.dimensions();
        let (width, height) = (dims.x as usize, dims.y as usize);
        Some(local.x as usize + width * (local.y as usize + height * local.z as usize))
    }

    pub fn voxel(&self, x: i32, y: i32, z: i32) -> Voxel {
        self.voxel_at(IVec3::new(x, y, z))
    }

    pub fn voxel_at(&self, p: IVec3) -> Voxel {
        self.index(p).map_or(self.border, |i| self.voxels[i])
    }

    /// Returns false if the position is outside the region
    pub fn set_voxel(&mut self, x: i32, y: i32, z: i32, voxel: Voxel) -> bool {
        self.set_voxel_at(IVec3::new(x, y, z), voxel)
    }

    pub fn set_voxel_at(&mut self, p: IVec3, voxel: Voxel) -> bool {
        match self.index(p) {
            Some(i) => {
                self.voxels[i] = voxel;
                true
            }
            None => false,
        }
    }

    pub fn fill(&mut self, voxel: Voxel) {
        self.voxels.fill(voxel);
    }

    /// Copy `region` into a new volume of exactly that region.
    ///
    /// Positions outside this volume receive the border voxel. The flag is
    /// true when no solid voxel was copied.
    pub fn copy_region(&self, region: &Region) -> (RawVolume, bool) {
        let mut copy = RawVolume::new(*region);
        copy.border = self.border;
        let mut only_air = true;
        if let Some(overlap) = self.region.intersection(region) {
            for p in overlap.positions() {
                let voxel = self.voxel_at(p);
                if voxel.is_blocked() {
                    only_air = false;
                }
                copy.set_voxel_at(p, voxel);
            }
        }
        (copy, only_air)
    }

    /// True if every voxel of `region` that lies in this volume is air
    pub fn is_only_air(&self, region: &Region) -> bool {
        self.region
            .intersection(region)
            .is_none_or(|overlap| overlap.positions().all(|p| self.voxel_at(p).is_air()))
    }

    /// Number of non-air voxels
    pub fn solid_count(&self) -> usize {
        self.voxels.iter().filter(|v| v.is_blocked()).count()
    }

    /// Merge several volumes into one enclosing all of their regions.
    ///
    /// Later volumes overwrite earlier ones where both hold solid voxels.
    /// Returns `None` when the input is empty.
    pub fn merge<'a>(volumes: impl IntoIterator<Item = &'a RawVolume>) -> Option<RawVolume> {
        let volumes: Vec<&RawVolume> = volumes.into_iter().collect();
        let region = volumes
            .iter()
            .fold(Region::INVALID, |acc, v| acc.union(v.region()));
        if !region.is_valid() {
            return None;
        }
        let mut merged = RawVolume::new(region);
        for volume in volumes {
            for p in volume.region.positions() {
                let voxel = volume.voxel_at(p);
                if voxel.is_blocked() {
                    merged.set_voxel_at(p, voxel);
                }
            }
        }
        Some(merged)
    }

    /// Approximate heap footprint
    pub fn size_in_bytes(&self) -> usize {
        self.voxels.len() * std::mem::size_of::<Voxel>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume_16() -> RawVolume {
        RawVolume::new(Region::from_coords(0, 0, 0, 15, 15, 15))
    }

    #[test]
    fn test_set_and_get() {
        let mut volume = volume_16();
        assert!(volume.set_voxel(1, 2, 3, Voxel::generic(5)));
        assert_eq!(volume.voxel(1, 2, 3), Voxel::generic(5));
        assert!(volume.voxel(3, 2, 1).is_air());
        assert_eq!(volume.solid_count(), 1);
    }

    #[test]
    fn test_outside_reads_border() {
        let mut volume = volume_16();
        assert!(!volume.set_voxel(16, 0, 0, Voxel::generic(1)));
        assert!(volume.voxel(-1, 0, 0).is_air());
        volume.set_border_voxel(Voxel::generic(9));
        assert_eq!(volume.voxel(100, 100, 100), Voxel::generic(9));
    }

    #[test]
    fn test_from_voxels_length_mismatch() {
        let region = Region::from_coords(0, 0, 0, 1, 1, 1);
        assert!(RawVolume::from_voxels(region, vec![Voxel::AIR; 7]).is_none());
        assert!(RawVolume::from_voxels(region, vec![Voxel::AIR; 8]).is_some());
    }

    #[test]
    fn test_copy_region_with_border() {
        let mut volume = volume_16();
        volume.set_voxel(0, 0, 0, Voxel::generic(1));
        let (copy, only_air) = volume.copy_region(&Region::from_coords(-2, -2, -2, 3, 3, 3));
        assert!(!only_air);
        assert_eq!(copy.region(), &Region::from_coords(-2, -2, -2, 3, 3, 3));
        assert_eq!(copy.voxel(0, 0, 0), Voxel::generic(1));
        assert!(copy.voxel(-2, -2, -2).is_air());
    }

    #[test]
    fn test_copy_region_only_air() {
        let mut volume = volume_16();
        volume.set_voxel(15, 15, 15, Voxel::generic(1));
        let (_, only_air) = volume.copy_region(&Region::from_coords(0, 0, 0, 7, 7, 7));
        assert!(only_air);
        assert!(volume.is_only_air(&Region::from_coords(0, 0, 0, 7, 7, 7)));
        assert!(!volume.is_only_air(&Region::from_coords(8, 8, 8, 15, 15, 15)));
    }

    #[test]
    fn test_merge() {
        let mut a = RawVolume::new(Region::from_coords(0, 0, 0, 1, 1, 1));
        a.set_voxel(0, 0, 0, Voxel::generic(1));
        let mut b = RawVolume::new(Region::from_coords(4, 0, 0, 5, 1, 1));
        b.set_voxel(5, 1, 1, Voxel::generic(2));

        let merged = RawVolume::merge([&a, &b]).unwrap();
        assert_eq!(merged.region(), &Region::from_coords(0, 0, 0, 5, 1, 1));
        assert_eq!(merged.voxel(0, 0, 0), Voxel::generic(1));
        assert_eq!(merged.voxel(5, 1, 1), Voxel::generic(2));
        assert_eq!(merged.solid_count(), 2);
        assert!(RawVolume::merge(std::iter::empty()).is_none());
    }
}
