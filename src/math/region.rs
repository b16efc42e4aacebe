//! Inclusive integer bounding box

use std::fmt;

use crate::core::types::IVec3;

/// Axis-aligned integer box with inclusive `mins`/`maxs` corners.
///
/// A region is valid when every component of `mins` is less than or equal to
/// the matching component of `maxs`. [`Region::INVALID`] is the empty
/// accumulator used as the starting point for unions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    mins: IVec3,
    maxs: IVec3,
}

impl Region {
    /// Empty region; any union with it yields the other operand
    pub const INVALID: Region = Region {
        mins: IVec3::splat(i32::MAX),
        maxs: IVec3::splat(i32::MIN),
    };

    /// Create region from inclusive corners
    pub fn new(mins: IVec3, maxs: IVec3) -> Self {
        Self { mins, maxs }
    }

    /// Create region from inclusive corner components
    pub fn from_coords(
        min_x: i32,
        min_y: i32,
        min_z: i32,
        max_x: i32,
        max_y: i32,
        max_z: i32,
    ) -> Self {
        Self::new(IVec3::new(min_x, min_y, min_z), IVec3::new(max_x, max_y, max_z))
    }

    /// Cube of `size` voxels per side starting at `mins`
    pub fn cube(mins: IVec3, size: i32) -> Self {
        Self::new(mins, mins + IVec3::splat(size - 1))
    }

    /// Single voxel region
    pub fn point(p: IVec3) -> Self {
        Self::new(p, p)
    }

    pub fn mins(&self) -> IVec3 {
        self.mins
    }

    pub fn maxs(&self) -> IVec3 {
        self.maxs
    }

    pub fn is_valid(&self) -> bool {
        self.mins.cmple(self.maxs).all()
    }

    /// Number of voxels along each axis (zero for invalid regions).
    ///
    /// Saturates at `i32::MAX` for regions spanning more voxels than that.
    pub fn dimensions(&self) -> IVec3 {
        if !self.is_valid() {
            return IVec3::ZERO;
        }
        let extent = |min: i32, max: i32| {
            (i64::from(max) - i64::from(min) + 1).min(i64::from(i32::MAX)) as i32
        };
        IVec3::new(
            extent(self.mins.x, self.maxs.x),
            extent(self.mins.y, self.maxs.y),
            extent(self.mins.z, self.maxs.z),
        )
    }

    /// Like [`Region::dimensions`], but `None` if an axis does not fit in `i32`
    pub fn checked_dimensions(&self) -> Option<IVec3> {
        if !self.is_valid() {
            return Some(IVec3::ZERO);
        }
        let extent = |min: i32, max: i32| max.checked_sub(min)?.checked_add(1);
        Some(IVec3::new(
            extent(self.mins.x, self.maxs.x)?,
            extent(self.mins.y, self.maxs.y)?,
            extent(self.mins.z, self.maxs.z)?,
        ))
    }

    pub fn width(&self) -> i32 {
        self.dimensions().x
    }

    pub fn height(&self) -> i32 {
        self.dimensions().y
    }

    pub fn depth(&self) -> i32 {
        self.dimensions().z
    }

    /// Total number of voxels enclosed, saturating at `usize::MAX`
    pub fn voxel_count(&self) -> usize {
        self.checked_voxel_count().unwrap_or(usize::MAX)
    }

    /// Total number of voxels enclosed, `None` on overflow
    pub fn checked_voxel_count(&self) -> Option<usize> {
        let d = self.checked_dimensions()?;
        (d.x as usize).checked_mul(d.y as usize)?.checked_mul(d.z as usize)
    }

    pub fn contains_point(&self, p: IVec3) -> bool {
        p.cmpge(self.mins).all() && p.cmple(self.maxs).all()
    }

    /// True if `other` lies completely inside this region
    pub fn contains_region(&self, other: &Region) -> bool {
        other.is_valid() && self.contains_point(other.mins) && self.contains_point(other.maxs)
    }

    /// True if the regions share at least one voxel
    pub fn intersects(&self, other: &Region) -> bool {
        self.is_valid()
            && other.is_valid()
            && self.mins.cmple(other.maxs).all()
            && self.maxs.cmpge(other.mins).all()
    }

    /// Overlap of both regions, if any
    pub fn intersection(&self, other: &Region) -> Option<Region> {
        if !self.intersects(other) {
            return None;
        }
        Some(Region::new(self.mins.max(other.mins), self.maxs.min(other.maxs)))
    }

    /// Smallest region enclosing both
    pub fn union(&self, other: &Region) -> Region {
        if !self.is_valid() {
            return *other;
        }
        if !other.is_valid() {
            return *self;
        }
        Region::new(self.mins.min(other.mins), self.maxs.max(other.maxs))
    }

    /// Grow the region so it encloses `p`
    pub fn accumulate(&mut self, p: IVec3) {
        *self = self.union(&Region::point(p));
    }

    /// Region expanded by `amount` voxels on every side
    pub fn grow(&self, amount: i32) -> Region {
        let delta = IVec3::splat(amount);
        Region::new(self.mins - delta, self.maxs + delta)
    }

    /// Region moved by `offset`
    pub fn shift(&self, offset: IVec3) -> Region {
        Region::new(self.mins + offset, self.maxs + offset)
    }

    /// Iterate all positions, x fastest, then y, then z
    pub fn positions(&self) -> impl Iterator<Item = IVec3> + use<> {
        let (mins, maxs) = (self.mins, self.maxs);
        (mins.z..=maxs.z).flat_map(move |z| {
            (mins.y..=maxs.y)
                .flat_map(move |y| (mins.x..=maxs.x).map(move |x| IVec3::new(x, y, z)))
        })
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{}:{} - {}:{}:{}]",
            self.mins.x, self.mins.y, self.mins.z, self.maxs.x, self.maxs.y, self.maxs.z
        )
    }
}
