//! Axis-aligned bounding box in world space

use crate::core::types::{Mat4, Vec3};
use super::region::Region;

/// World-space box, used for culling and depth sorting of volume slots
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Bounds covering every voxel of an integer region.
    ///
    /// Voxel `p` occupies `[p, p + 1)`, so the upper corner is `maxs + 1`.
    pub fn from_region(region: &Region) -> Self {
        Self {
            min: region.mins().as_vec3(),
            max: (region.maxs() + 1).as_vec3(),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Extent along each axis
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// True if the boxes overlap or touch
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// Grow the box so it encloses `p`
    pub fn expand(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Bounds of this box after an affine transform (all eight corners)
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let first = matrix.transform_point3(self.min);
        let mut out = Aabb::new(first, first);
        for i in 1..8u8 {
            let corner = Vec3::new(
                if i & 1 != 0 { self.max.x } else { self.min.x },
                if i & 2 != 0 { self.max.y } else { self.min.y },
                if i & 4 != 0 { self.max.z } else { self.min.z },
            );
            out.expand(matrix.transform_point3(corner));
        }
        out
    }
}
