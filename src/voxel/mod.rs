//! Voxel data structures and operations

pub mod voxel;
pub mod palette;
pub mod raw_volume;

pub use voxel::{Voxel, VoxelMaterial};
pub use palette::{Palette, PALETTE_MAX_COLORS};
pub use raw_volume::RawVolume;
