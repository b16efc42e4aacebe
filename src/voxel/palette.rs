//! Color palette referenced by voxel color indices

/// Number of entries in every palette
pub const PALETTE_MAX_COLORS: usize = 256;

/// 256-entry RGBA palette.
///
/// Palettes are passed explicitly to extraction and loading; nothing in the
/// crate reads a process-wide palette.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Palette {
    colors: Vec<[u8; 4]>,
}

impl Palette {
    /// Build from a color list, padding with opaque black or truncating to 256 entries
    pub fn new(mut colors: Vec<[u8; 4]>) -> Self {
        colors.resize(PALETTE_MAX_COLORS, [0, 0, 0, 255]);
        Self { colors }
    }

    /// Opaque gray ramp from black (index 0) to white (index 255)
    pub fn grayscale() -> Self {
        Self::new((0..=255u8).map(|v| [v, v, v, 255]).collect())
    }

    pub fn colors(&self) -> &[[u8; 4]] {
        &self.colors
    }

    pub fn color(&self, index: u8) -> [u8; 4] {
        self.colors[index as usize]
    }

    /// Color as normalized floats
    pub fn color_f32(&self, index: u8) -> [f32; 4] {
        self.color(index).map(|c| c as f32 / 255.0)
    }

    pub fn set_color(&mut self, index: u8, rgba: [u8; 4]) {
        self.colors[index as usize] = rgba;
    }

    /// True if the entry is not fully opaque
    pub fn has_alpha(&self, index: u8) -> bool {
        self.color(index)[3] < 255
    }

    /// Index of the entry with the smallest squared RGBA distance
    pub fn closest_match(&self, rgba: [u8; 4]) -> u8 {
        let distance = |c: &[u8; 4]| -> u32 {
            c.iter()
                .zip(rgba.iter())
                .map(|(&a, &b)| {
                    let d = a as i32 - b as i32;
                    (d * d) as u32
                })
                .sum()
        };
        self.colors
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| distance(c))
            .map(|(i, _)| i as u8)
            .unwrap_or(0)
    }

    /// Lookup table mapping every index of `source` to the closest entry of `self`
    pub fn remap_table(&self, source: &Palette) -> [u8; PALETTE_MAX_COLORS] {
        let mut table = [0u8; PALETTE_MAX_COLORS];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = self.closest_match(source.colors[i]);
        }
        table
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::grayscale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pads_to_full_size() {
        let palette = Palette::new(vec![[255, 0, 0, 255]]);
        assert_eq!(palette.colors().len(), PALETTE_MAX_COLORS);
        assert_eq!(palette.color(0), [255, 0, 0, 255]);
        assert_eq!(palette.color(1), [0, 0, 0, 255]);
    }

    #[test]
    fn test_closest_match() {
        let mut palette = Palette::grayscale();
        palette.set_color(7, [250, 10, 10, 255]);
        assert_eq!(palette.closest_match([255, 0, 0, 255]), 7);
        assert_eq!(palette.closest_match([128, 128, 128, 255]), 128);
    }

    #[test]
    fn test_has_alpha() {
        let mut palette = Palette::grayscale();
        assert!(!palette.has_alpha(3));
        palette.set_color(3, [10, 10, 10, 128]);
        assert!(palette.has_alpha(3));
    }

    #[test]
    fn test_remap_identity() {
        let palette = Palette::grayscale();
        let table = palette.remap_table(&palette);
        assert!(table.iter().enumerate().all(|(i, &v)| i == v as usize));
    }
}
