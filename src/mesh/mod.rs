//! Mesh data and surface extraction

pub mod extractor;
pub mod mesh;

pub use extractor::{CubicExtractor, SurfaceExtractor};
pub use mesh::{ExtractedMesh, Mesh, MeshMode, MeshType, VoxelVertex};
