//! Host-side mesh data produced by surface extraction

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::core::types::{IVec3, Vec3};

/// Vertex of an extracted voxel mesh - 16 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VoxelVertex {
    /// Position in volume space
    pub position: [f32; 3],
    /// RGBA color resolved from the palette
    pub color: [u8; 4],
}

/// Surface representation produced by the extractor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshMode {
    /// Blocky faces with flat shading
    #[default]
    Cubic,
    /// Smooth-shaded surface with per-vertex normals
    MarchingCubes,
}

/// Render pass a mesh belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeshType {
    Opaque,
    Transparent,
}

impl MeshType {
    pub const ALL: [MeshType; 2] = [MeshType::Opaque, MeshType::Transparent];
}

/// Indexed triangle mesh
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    vertices: Vec<VoxelVertex>,
    /// Per-vertex normals; empty unless the mesh is smooth-shaded
    normals: Vec<[f32; 3]>,
    indices: Vec<u32>,
    /// Minimum corner of the region the mesh was extracted from
    offset: IVec3,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(offset: IVec3) -> Self {
        Self { offset, ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn vertices(&self) -> &[VoxelVertex] {
        &self.vertices
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn offset(&self) -> IVec3 {
        self.offset
    }

    /// Append a vertex and return its index
    pub fn add_vertex(&mut self, vertex: VoxelVertex) -> u32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Append another mesh, rebasing its indices
    pub fn append(&mut self, other: &Mesh) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
        if !other.normals.is_empty() || !self.normals.is_empty() {
            self.normals.resize(base as usize, [0.0; 3]);
            self.normals.extend_from_slice(&other.normals);
            self.normals.resize(self.vertices.len(), [0.0; 3]);
        }
    }

    /// Compute per-vertex normals by averaging the face normals of every
    /// triangle sharing the vertex position.
    pub fn calculate_smooth_normals(&mut self) {
        use std::collections::HashMap;

        let key = |p: [f32; 3]| p.map(f32::to_bits);
        let mut accumulated: HashMap<[u32; 3], Vec3> = HashMap::new();
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]]
                .map(|i| Vec3::from_array(self.vertices[i as usize].position));
            let face_normal = (b - a).cross(c - a);
            for &i in tri {
                let position = self.vertices[i as usize].position;
                *accumulated.entry(key(position)).or_default() += face_normal;
            }
        }
        self.normals = self
            .vertices
            .iter()
            .map(|v| {
                accumulated
                    .get(&key(v.position))
                    .map_or(Vec3::ZERO, |n| n.normalize_or_zero())
                    .to_array()
            })
            .collect();
    }

    /// Centroid of all vertices in volume space
    pub fn center(&self) -> Vec3 {
        if self.vertices.is_empty() {
            return Vec3::ZERO;
        }
        let sum: Vec3 = self.vertices.iter().map(|v| Vec3::from_array(v.position)).sum();
        sum / self.vertices.len() as f32
    }

    /// Size of the vertex, normal and index data in bytes
    pub fn size_in_bytes(&self) -> usize {
        self.vertices.len() * std::mem::size_of::<VoxelVertex>()
            + self.normals.len() * std::mem::size_of::<[f32; 3]>()
            + self.indices.len() * std::mem::size_of::<u32>()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.normals.clear();
        self.indices.clear();
    }
}

/// Opaque and transparent meshes of one extracted region
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractedMesh {
    pub opaque: Mesh,
    pub transparent: Mesh,
}

impl ExtractedMesh {
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }

    pub fn get(&self, mesh_type: MeshType) -> &Mesh {
        match mesh_type {
            MeshType::Opaque => &self.opaque,
            MeshType::Transparent => &self.transparent,
        }
    }

    pub fn get_mut(&mut self, mesh_type: MeshType) -> &mut Mesh {
        match mesh_type {
            MeshType::Opaque => &mut self.opaque,
            MeshType::Transparent => &mut self.transparent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32, y: f32, z: f32) -> VoxelVertex {
        VoxelVertex { position: [x, y, z], color: [255; 4] }
    }

    fn quad() -> Mesh {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(vertex(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(vertex(1.0, 0.0, 0.0));
        let c = mesh.add_vertex(vertex(1.0, 1.0, 0.0));
        let d = mesh.add_vertex(vertex(0.0, 1.0, 0.0));
        mesh.add_triangle(a, b, c);
        mesh.add_triangle(a, c, d);
        mesh
    }

    #[test]
    fn test_vertex_size() {
        assert_eq!(std::mem::size_of::<VoxelVertex>(), 16);
    }

    #[test]
    fn test_append_rebases_indices() {
        let mut mesh = quad();
        mesh.append(&quad());
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(&mesh.indices()[6..], &[4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn test_smooth_normals_of_flat_quad() {
        let mut mesh = quad();
        mesh.calculate_smooth_normals();
        assert_eq!(mesh.normals().len(), 4);
        for n in mesh.normals() {
            assert!((Vec3::from_array(*n) - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn test_append_keeps_normals_aligned() {
        let mut smooth = quad();
        smooth.calculate_smooth_normals();
        let mut mesh = quad();
        mesh.append(&smooth);
        assert_eq!(mesh.normals().len(), mesh.vertex_count());
        assert_eq!(mesh.normals()[0], [0.0; 3]);
    }

    #[test]
    fn test_center() {
        assert_eq!(quad().center(), Vec3::new(0.5, 0.5, 0.0));
        assert_eq!(Mesh::new().center(), Vec3::ZERO);
    }

    #[test]
    fn test_mesh_mode_serde() {
        assert_eq!(serde_json::to_string(&MeshMode::MarchingCubes).unwrap(), "\"marching_cubes\"");
        assert_eq!(MeshMode::default(), MeshMode::Cubic);
    }
}
