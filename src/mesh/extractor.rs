//! Surface extraction from voxel snapshots
//!
//! Extraction is a pure function of a volume snapshot, the target region, the
//! palette and the mesh mode. Workers call it on copies, never on live data.

use crate::core::types::IVec3;
use crate::math::Region;
use crate::voxel::{Palette, RawVolume, Voxel};
use super::mesh::{ExtractedMesh, Mesh, MeshMode, VoxelVertex};

/// Turns the voxels of `region` into opaque and transparent meshes.
///
/// `volume` may extend past `region`; voxels outside it are only used to
/// decide face visibility at the region boundary.
pub trait SurfaceExtractor: Send + Sync {
    fn extract(
        &self,
        volume: &RawVolume,
        region: &Region,
        palette: &Palette,
        mode: MeshMode,
    ) -> ExtractedMesh;
}

/// Face directions: (normal, u, v) with u x v = normal
const FACES: [(IVec3, IVec3, IVec3); 6] = [
    (IVec3::X, IVec3::Y, IVec3::Z),
    (IVec3::NEG_X, IVec3::Z, IVec3::Y),
    (IVec3::Y, IVec3::Z, IVec3::X),
    (IVec3::NEG_Y, IVec3::X, IVec3::Z),
    (IVec3::Z, IVec3::X, IVec3::Y),
    (IVec3::NEG_Z, IVec3::Y, IVec3::X),
];

/// Emits one quad per visible voxel face.
///
/// A face is visible when the neighbor is air, or when the neighbor is
/// see-through and the voxel itself is not. Voxels with a transparent material
/// or a translucent palette entry go into the transparent mesh. In
/// [`MeshMode::MarchingCubes`] the same surface is emitted with smoothed
/// per-vertex normals.
#[derive(Clone, Copy, Debug, Default)]
pub struct CubicExtractor;

impl CubicExtractor {
    fn see_through(voxel: Voxel, palette: &Palette) -> bool {
        voxel.is_transparent() || palette.has_alpha(voxel.color)
    }

    fn add_face(mesh: &mut Mesh, pos: IVec3, face: (IVec3, IVec3, IVec3), color: [u8; 4]) {
        let (normal, u, v) = face;
        let base = pos + normal.max(IVec3::ZERO);
        let corners = [base, base + u, base + u + v, base + v];
        let [a, b, c, d] = corners.map(|corner| {
            mesh.add_vertex(VoxelVertex {
                position: corner.as_vec3().to_array(),
                color,
            })
        });
        mesh.add_triangle(a, b, c);
        mesh.add_triangle(a, c, d);
    }
}

impl SurfaceExtractor for CubicExtractor {
    fn extract(
        &self,
        volume: &RawVolume,
        region: &Region,
        palette: &Palette,
        mode: MeshMode,
    ) -> ExtractedMesh {
        let mut result = ExtractedMesh {
            opaque: Mesh::with_offset(region.mins()),
            transparent: Mesh::with_offset(region.mins()),
        };

        for pos in region.positions() {
            let voxel = volume.voxel_at(pos);
            if voxel.is_air() {
                continue;
            }
            let see_through = Self::see_through(voxel, palette);
            let color = palette.color(voxel.color);
            let mesh = if see_through { &mut result.transparent } else { &mut result.opaque };

            for face in FACES {
                let neighbor = volume.voxel_at(pos + face.0);
                let visible =
                    neighbor.is_air() || (!see_through && Self::see_through(neighbor, palette));
                if visible {
                    Self::add_face(mesh, pos, face, color);
                }
            }
        }

        if mode == MeshMode::MarchingCubes {
            result.opaque.calculate_smooth_normals();
            result.transparent.calculate_smooth_normals();
        }
        result
    }
}
