//! Voxel data type

use bytemuck::{Pod, Zeroable};
use rkyv::{Archive, Deserialize, Serialize};

/// Voxel flags
pub mod flags {
    pub const SELECTED: u8 = 1 << 0;
    pub const OUTLINE: u8 = 1 << 1;
}

/// Material class of a voxel, stored as a byte in [`Voxel::material`]
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VoxelMaterial {
    #[default]
    Air = 0,
    Generic = 1,
    Transparent = 2,
}

impl VoxelMaterial {
    /// Decode a stored material byte; unknown values read as air
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => VoxelMaterial::Generic,
            2 => VoxelMaterial::Transparent,
            _ => VoxelMaterial::Air,
        }
    }
}

/// Single voxel - exactly 4 bytes
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Archive, Deserialize,
    Serialize,
)]
pub struct Voxel {
    /// `VoxelMaterial` discriminant
    pub material: u8,
    /// Palette index
    pub color: u8,
    /// Editor flags (selection, outline)
    pub flags: u8,
    /// Normal palette index, 0 = none
    pub normal: u8,
}

impl Voxel {
    /// Empty/air voxel
    pub const AIR: Voxel = Voxel {
        material: VoxelMaterial::Air as u8,
        color: 0,
        flags: 0,
        normal: 0,
    };

    /// Create voxel with the given material and palette index
    pub fn new(material: VoxelMaterial, color: u8) -> Self {
        Self {
            material: material as u8,
            color,
            flags: 0,
            normal: 0,
        }
    }

    /// Solid voxel using palette index `color`
    pub fn generic(color: u8) -> Self {
        Self::new(VoxelMaterial::Generic, color)
    }

    /// See-through voxel using palette index `color`
    pub fn transparent(color: u8) -> Self {
        Self::new(VoxelMaterial::Transparent, color)
    }

    pub fn material(&self) -> VoxelMaterial {
        VoxelMaterial::from_u8(self.material)
    }

    /// Check if voxel is empty (air)
    pub fn is_air(&self) -> bool {
        self.material() == VoxelMaterial::Air
    }

    /// Check if voxel occupies space
    pub fn is_blocked(&self) -> bool {
        !self.is_air()
    }

    /// Check if voxel is transparent
    pub fn is_transparent(&self) -> bool {
        self.material() == VoxelMaterial::Transparent
    }

    /// Create a copy of this voxel with the given flags value
    pub fn with_flags(self, flags: u8) -> Self {
        Self { flags, ..self }
    }

    /// Same material and color, ignoring flags and normal
    pub fn is_same(&self, other: &Voxel) -> bool {
        self.material() == other.material() && self.color == other.color
    }
}
