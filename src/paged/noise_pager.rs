//! Procedural heightmap terrain as a chunk source

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::math::Region;
use crate::voxel::Voxel;
use super::chunk::Chunk;
use super::pager::Pager;

/// Parameters controlling terrain generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    pub seed: u32,
    pub scale: f32,        // Horizontal scale (larger = smoother)
    pub height_scale: f32, // Maximum terrain height in voxels
    pub octaves: u32,      // FBM octaves (detail levels)
    pub persistence: f32,  // FBM persistence (0.5 typical)
    pub lacunarity: f32,   // FBM lacunarity (2.0 typical)
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            scale: 100.0,
            height_scale: 64.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// Pager that fills columns below an fBm height field.
///
/// Surface voxels use palette index `surface_color`, everything deeper uses
/// `ground_color`. Evicted chunks are discarded since they can be regenerated.
pub struct NoisePager {
    params: NoiseParams,
    noise: Fbm<Perlin>,
    surface_color: u8,
    ground_color: u8,
}

impl NoisePager {
    pub fn new(params: NoiseParams) -> Self {
        let noise = Fbm::<Perlin>::new(params.seed)
            .set_octaves(params.octaves as usize)
            .set_persistence(params.persistence as f64)
            .set_lacunarity(params.lacunarity as f64);

        Self {
            params,
            noise,
            surface_color: 2,
            ground_color: 1,
        }
    }

    /// Palette indices used for the top voxel and the rest of each column
    pub fn with_colors(mut self, surface_color: u8, ground_color: u8) -> Self {
        self.surface_color = surface_color;
        self.ground_color = ground_color;
        self
    }

    pub fn params(&self) -> &NoiseParams {
        &self.params
    }

    /// Terrain height (in voxels) of the column at (x, z)
    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        let nx = (x as f32 / self.params.scale) as f64;
        let nz = (z as f32 / self.params.scale) as f64;

        // Noise is in [-1, 1]
        let normalized = (self.noise.get([nx, nz]) + 1.0) / 2.0;
        (normalized.clamp(0.0, 1.0) * self.params.height_scale as f64) as i32
    }
}

impl Pager for NoisePager {
    fn page_in(&mut self, region: &Region, chunk: &mut Chunk) -> bool {
        let (mins, maxs) = (region.mins(), region.maxs());
        // Entirely above the highest possible surface
        if mins.y > self.params.height_scale.ceil() as i32 {
            return true;
        }

        let side = chunk.side_length();
        for (lz, z) in (mins.z..=maxs.z).enumerate() {
            for (lx, x) in (mins.x..=maxs.x).enumerate() {
                let height = self.height_at(x, z);
                let top = height.min(maxs.y);
                for y in mins.y..=top {
                    let color = if y == height { self.surface_color } else { self.ground_color };
                    let ly = (y - mins.y) as u32;
                    if ly < side {
                        chunk.set_voxel_local(lx as u32, ly, lz as u32, Voxel::generic(color));
                    }
                }
            }
        }
        true
    }

    fn page_out(&mut self, _region: &Region, _chunk: &Chunk) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paged::ChunkCoord;

    #[test]
    fn test_height_in_range() {
        let pager = NoisePager::new(NoiseParams::default());
        for x in (-200..200).step_by(37) {
            for z in (-200..200).step_by(41) {
                let h = pager.height_at(x, z);
                assert!((0..=64).contains(&h));
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let a = NoisePager::new(NoiseParams::default());
        let b = NoisePager::new(NoiseParams::default());
        assert_eq!(a.height_at(17, -33), b.height_at(17, -33));
    }

    #[test]
    fn test_columns_filled_to_height() {
        let mut pager = NoisePager::new(NoiseParams {
            height_scale: 24.0,
            ..Default::default()
        });
        let mut chunk = Chunk::try_new(ChunkCoord::new(0, 0, 0), 5).unwrap();
        let region = chunk.region();
        assert!(pager.page_in(&region, &mut chunk));

        let height = pager.height_at(3, 4);
        assert!(chunk.voxel_local(3, 0, 4).is_blocked());
        assert_eq!(chunk.voxel_local(3, height as u32, 4), Voxel::generic(2));
        if height < 31 {
            assert!(chunk.voxel_local(3, height as u32 + 1, 4).is_air());
        }
    }

    #[test]
    fn test_chunks_above_terrain_stay_empty() {
        let mut pager = NoisePager::new(NoiseParams::default());
        let mut chunk = Chunk::try_new(ChunkCoord::new(0, 10, 0), 4).unwrap();
        let region = chunk.region();
        assert!(pager.page_in(&region, &mut chunk));
        assert!(chunk.is_only_air());
    }
}
