//! Volume file formats
//!
//! Formats decode bytes into one or more [`RawVolume`]s whose color indices
//! refer to the caller's [`Palette`]. The [`FormatRegistry`] keeps formats in
//! priority order; the volume cache tries extensions in that order.

use std::path::Path;

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

use crate::core::types::IVec3;
use crate::core::{Error, Result};
use crate::math::Region;
use crate::voxel::{Palette, RawVolume, Voxel, VoxelMaterial};

/// Encoder/decoder for one file extension
pub trait VolumeFormat: Send + Sync {
    /// Extension without the leading dot
    fn extension(&self) -> &str;

    fn load(&self, data: &[u8], palette: &Palette) -> Result<Vec<RawVolume>>;

    fn save(&self, volumes: &[&RawVolume], palette: &Palette) -> Result<Vec<u8>>;
}

/// Largest volume a format will allocate, in voxels
pub const MAX_VOLUME_VOXELS: usize = 1 << 28;

/// Region read from a file, rejected if it is inverted or too large to allocate
fn decoded_region(mins: [i32; 3], maxs: [i32; 3]) -> Result<Region> {
    let region = Region::new(IVec3::from_array(mins), IVec3::from_array(maxs));
    if !region.is_valid() {
        return Err(Error::Format(format!("invalid region {region}")));
    }
    match region.checked_voxel_count() {
        Some(count) if count <= MAX_VOLUME_VOXELS => Ok(region),
        _ => Err(Error::Format(format!(
            "region {region} exceeds {MAX_VOLUME_VOXELS} voxels"
        ))),
    }
}

// --- Native binary format ---

const NATIVE_MAGIC: &[u8; 4] = b"VXC1";

#[derive(Archive, RkyvDeserialize, RkyvSerialize)]
struct VolumeData {
    mins: [i32; 3],
    maxs: [i32; 3],
    voxels: Vec<Voxel>,
}

#[derive(Archive, RkyvDeserialize, RkyvSerialize)]
struct VolumeFileData {
    /// Palette the color indices were written against
    palette: Vec<[u8; 4]>,
    volumes: Vec<VolumeData>,
}

/// Compact binary format: magic, then an LZ4-compressed rkyv archive.
///
/// The writer's palette is stored alongside the voxels and colors are remapped
/// onto the reader's palette on load.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeFormat;

impl VolumeFormat for NativeFormat {
    fn extension(&self) -> &str {
        "vxc"
    }

    fn load(&self, data: &[u8], palette: &Palette) -> Result<Vec<RawVolume>> {
        let payload = data
            .strip_prefix(NATIVE_MAGIC.as_slice())
            .ok_or_else(|| Error::Format("missing vxc header".into()))?;
        let decompressed = lz4_flex::decompress_size_prepended(payload)
            .map_err(|e| Error::Format(format!("LZ4 decompression failed: {}", e)))?;

        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(decompressed.len());
        aligned.extend_from_slice(&decompressed);
        let archived = rkyv::access::<ArchivedVolumeFileData, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Format(e.to_string()))?;
        let file: VolumeFileData =
            rkyv::deserialize::<VolumeFileData, rkyv::rancor::Error>(archived)
                .map_err(|e| Error::Format(e.to_string()))?;

        let remap = palette.remap_table(&Palette::new(file.palette));
        file.volumes
            .into_iter()
            .map(|data| {
                let region = decoded_region(data.mins, data.maxs)?;
                let voxels = data
                    .voxels
                    .into_iter()
                    .map(|v| {
                        if v.is_air() {
                            v
                        } else {
                            Voxel { color: remap[v.color as usize], ..v }
                        }
                    })
                    .collect();
                RawVolume::from_voxels(region, voxels).ok_or_else(|| {
                    Error::Format(format!("voxel count does not match region {region}"))
                })
            })
            .collect()
    }

    fn save(&self, volumes: &[&RawVolume], palette: &Palette) -> Result<Vec<u8>> {
        let file = VolumeFileData {
            palette: palette.colors().to_vec(),
            volumes: volumes
                .iter()
                .map(|v| VolumeData {
                    mins: v.region().mins().to_array(),
                    maxs: v.region().maxs().to_array(),
                    voxels: v.voxels().to_vec(),
                })
                .collect(),
        };
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&file)
            .map_err(|e| Error::Format(e.to_string()))?;

        let mut out = NATIVE_MAGIC.to_vec();
        out.extend_from_slice(&lz4_flex::compress_prepend_size(&bytes));
        Ok(out)
    }
}

// --- JSON format ---

#[derive(Serialize, Deserialize)]
struct JsonVoxel {
    x: i32,
    y: i32,
    z: i32,
    rgba: [u8; 4],
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    transparent: bool,
}

#[derive(Serialize, Deserialize)]
struct JsonVolume {
    mins: [i32; 3],
    maxs: [i32; 3],
    voxels: Vec<JsonVoxel>,
}

#[derive(Serialize, Deserialize)]
struct JsonFile {
    volumes: Vec<JsonVolume>,
}

/// Human-readable sparse format listing solid voxels with their RGBA color.
///
/// Colors are matched to the closest palette entry on load. Voxels with alpha
/// below 255 or an explicit `transparent` flag load as transparent.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonFormat;

impl VolumeFormat for JsonFormat {
    fn extension(&self) -> &str {
        "json"
    }

    fn load(&self, data: &[u8], palette: &Palette) -> Result<Vec<RawVolume>> {
        let file: JsonFile =
            serde_json::from_slice(data).map_err(|e| Error::Format(e.to_string()))?;
        let mut volumes = Vec::with_capacity(file.volumes.len());
        for json in file.volumes {
            let region = decoded_region(json.mins, json.maxs)?;
            let mut volume = RawVolume::new(region);
            for v in json.voxels {
                let material = if v.transparent || v.rgba[3] < 255 {
                    VoxelMaterial::Transparent
                } else {
                    VoxelMaterial::Generic
                };
                let voxel = Voxel::new(material, palette.closest_match(v.rgba));
                if !volume.set_voxel(v.x, v.y, v.z, voxel) {
                    return Err(Error::Format(format!(
                        "voxel ({}, {}, {}) outside {region}",
                        v.x, v.y, v.z
                    )));
                }
            }
            volumes.push(volume);
        }
        Ok(volumes)
    }

    fn save(&self, volumes: &[&RawVolume], palette: &Palette) -> Result<Vec<u8>> {
        let file = JsonFile {
            volumes: volumes
                .iter()
                .map(|volume| JsonVolume {
                    mins: volume.region().mins().to_array(),
                    maxs: volume.region().maxs().to_array(),
                    voxels: volume
                        .region()
                        .positions()
                        .filter_map(|p| {
                            let voxel = volume.voxel_at(p);
                            voxel.is_blocked().then(|| JsonVoxel {
                                x: p.x,
                                y: p.y,
                                z: p.z,
                                rgba: palette.color(voxel.color),
                                transparent: voxel.is_transparent(),
                            })
                        })
                        .collect(),
                })
                .collect(),
        };
        serde_json::to_vec_pretty(&file).map_err(|e| Error::Format(e.to_string()))
    }
}

/// Formats in extension priority order
pub struct FormatRegistry {
    formats: Vec<Box<dyn VolumeFormat>>,
}

impl FormatRegistry {
    /// Registry without any format
    pub fn empty() -> Self {
        Self { formats: Vec::new() }
    }

    /// Native binary first, then JSON
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(NativeFormat));
        registry.register(Box::new(JsonFormat));
        registry
    }

    /// Append a format at the lowest priority
    pub fn register(&mut self, format: Box<dyn VolumeFormat>) {
        self.formats.push(format);
    }

    /// Formats in priority order
    pub fn iter(&self) -> impl Iterator<Item = &dyn VolumeFormat> {
        self.formats.iter().map(|f| f.as_ref())
    }

    /// Extensions in priority order
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|f| f.extension())
    }

    pub fn find(&self, extension: &str) -> Option<&dyn VolumeFormat> {
        self.formats
            .iter()
            .find(|f| f.extension().eq_ignore_ascii_case(extension))
            .map(|f| f.as_ref())
    }

    fn format_for_path(&self, path: &Path) -> Result<&dyn VolumeFormat> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        self.find(extension)
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))
    }

    /// Decode a file, choosing the format by its extension
    pub fn load_file(&self, path: impl AsRef<Path>, palette: &Palette) -> Result<Vec<RawVolume>> {
        let path = path.as_ref();
        let format = self.format_for_path(path)?;
        format.load(&std::fs::read(path)?, palette)
    }

    /// Encode volumes into a file, choosing the format by its extension
    pub fn save_file(
        &self,
        path: impl AsRef<Path>,
        volumes: &[&RawVolume],
        palette: &Palette,
    ) -> Result<()> {
        let path = path.as_ref();
        let format = self.format_for_path(path)?;
        std::fs::write(path, format.save(volumes, palette)?)?;
        log::info!("Saved {} volume(s) to {}", volumes.len(), path.display());
        Ok(())
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_volume() -> RawVolume {
        let mut volume = RawVolume::new(Region::from_coords(-1, 0, 0, 2, 1, 1));
        volume.set_voxel(-1, 0, 0, Voxel::generic(10));
        volume.set_voxel(2, 1, 1, Voxel::transparent(200));
        volume
    }

    #[test]
    fn test_native_preserves_voxels() {
        let palette = Palette::grayscale();
        let volume = sample_volume();
        let bytes = NativeFormat.save(&[&volume], &palette).unwrap();
        assert!(bytes.starts_with(b"VXC1"));

        let loaded = NativeFormat.load(&bytes, &palette).unwrap();
        assert_eq!(loaded, vec![volume]);
    }

    #[test]
    fn test_native_remaps_onto_reader_palette() {
        let mut writer = Palette::grayscale();
        writer.set_color(10, [255, 0, 0, 255]);
        let mut reader = Palette::grayscale();
        reader.set_color(77, [250, 0, 0, 255]);

        let bytes = NativeFormat.save(&[&sample_volume()], &writer).unwrap();
        let loaded = NativeFormat.load(&bytes, &reader).unwrap();
        assert_eq!(loaded[0].voxel(-1, 0, 0).color, 77);
    }

    #[test]
    fn test_oversized_regions_are_format_errors() {
        let palette = Palette::default();
        let json = br#"{"volumes":[{"mins":[0,0,0],"maxs":[2000000000,2000000000,0],
            "voxels":[]}]}"#;
        assert!(matches!(JsonFormat.load(json, &palette), Err(Error::Format(_))));
        let extremes = br#"{"volumes":[{"mins":[-2147483648,-2147483648,-2147483648],
            "maxs":[2147483647,2147483647,2147483647],"voxels":[]}]}"#;
        assert!(matches!(JsonFormat.load(extremes, &palette), Err(Error::Format(_))));

        let file = VolumeFileData {
            palette: palette.colors().to_vec(),
            volumes: vec![VolumeData {
                mins: [i32::MIN; 3],
                maxs: [i32::MAX; 3],
                voxels: Vec::new(),
            }],
        };
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&file).unwrap();
        let mut data = NATIVE_MAGIC.to_vec();
        data.extend_from_slice(&lz4_flex::compress_prepend_size(&bytes));
        assert!(matches!(NativeFormat.load(&data, &palette), Err(Error::Format(_))));
    }

    #[test]
    fn test_native_rejects_bad_header() {
        assert!(matches!(
            NativeFormat.load(b"nope", &Palette::default()),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let palette = Palette::grayscale();
        let volume = sample_volume();
        let bytes = JsonFormat.save(&[&volume], &palette).unwrap();
        let loaded = JsonFormat.load(&bytes, &palette).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].voxel(-1, 0, 0), Voxel::generic(10));
        assert_eq!(loaded[0].voxel(2, 1, 1), Voxel::transparent(200));
    }

    #[test]
    fn test_json_alpha_loads_transparent() {
        let json = br#"{"volumes":[{"mins":[0,0,0],"maxs":[1,1,1],
            "voxels":[{"x":1,"y":0,"z":0,"rgba":[128,128,128,100]}]}]}"#;
        let loaded = JsonFormat.load(json, &Palette::grayscale()).unwrap();
        assert!(loaded[0].voxel(1, 0, 0).is_transparent());
    }

    #[test]
    fn test_json_rejects_voxel_outside_region() {
        let json = br#"{"volumes":[{"mins":[0,0,0],"maxs":[1,1,1],
            "voxels":[{"x":5,"y":0,"z":0,"rgba":[0,0,0,255]}]}]}"#;
        assert!(JsonFormat.load(json, &Palette::grayscale()).is_err());
    }

    #[test]
    fn test_registry_priority_and_lookup() {
        let registry = FormatRegistry::with_defaults();
        assert_eq!(registry.extensions().collect::<Vec<_>>(), vec!["vxc", "json"]);
        assert!(registry.find("JSON").is_some());
        assert!(registry.find("vox").is_none());
    }

    #[test]
    fn test_registry_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FormatRegistry::with_defaults();
        let palette = Palette::grayscale();
        let volume = sample_volume();

        let path = dir.path().join("model.vxc");
        registry.save_file(&path, &[&volume], &palette).unwrap();
        assert_eq!(registry.load_file(&path, &palette).unwrap(), vec![volume]);

        assert!(matches!(
            registry.load_file(dir.path().join("model.obj"), &palette),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
