//! View frustum for culling volume slots

use crate::core::types::{Mat4, Vec3, Vec4};
use super::aabb::Aabb;

/// Frustum plane in Hessian normal form
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    fn from_coefficients(v: Vec4) -> Self {
        let normal = v.truncate();
        let len = normal.length();
        if len <= f32::EPSILON {
            return Self { normal: Vec3::ZERO, distance: 0.0 };
        }
        Self { normal: normal / len, distance: v.w / len }
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// View frustum with 6 planes (left, right, bottom, top, near, far)
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix (Gribb/Hartmann).
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let w = vp.row(3);
        let planes = [
            w + vp.row(0),
            w - vp.row(0),
            w + vp.row(1),
            w - vp.row(1),
            w + vp.row(2),
            w - vp.row(2),
        ]
        .map(Plane::from_coefficients);
        Self { planes }
    }

    /// Conservative AABB test: false only when the box is fully outside a plane
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let positive = Vec3::select(plane.normal.cmpge(Vec3::ZERO), aabb.max, aabb.min);
            plane.distance_to_point(positive) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frustum() -> Frustum {
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn test_plane_distance() {
        let plane = Plane::from_coefficients(Vec4::new(0.0, 2.0, 0.0, 0.0));
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, 5.0, 0.0)), 5.0);
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, -3.0, 0.0)), -3.0);
    }

    #[test]
    fn test_box_in_front_is_visible() {
        let frustum = test_frustum();
        assert!(frustum.intersects_aabb(&Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))));
    }

    #[test]
    fn test_box_behind_camera_is_culled() {
        let frustum = test_frustum();
        let behind = Aabb::new(Vec3::new(-1.0, -1.0, 20.0), Vec3::new(1.0, 1.0, 22.0));
        assert!(!frustum.intersects_aabb(&behind));
    }

    #[test]
    fn test_box_beyond_far_plane_is_culled() {
        let frustum = test_frustum();
        let far = Aabb::new(Vec3::new(-1.0, -1.0, -500.0), Vec3::new(1.0, 1.0, -400.0));
        assert!(!frustum.intersects_aabb(&far));
    }
}
