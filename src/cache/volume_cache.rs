//! Process-wide cache of decoded volume assets
//!
//! Each asset is decoded at most once per key and shared as an
//! `Arc<RawVolume>`. Failed loads are remembered as negative entries so a
//! missing asset does not cause repeated I/O.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::math::Region;
use crate::voxel::{Palette, RawVolume};
use super::format::{FormatRegistry, MAX_VOLUME_VOXELS};
use super::source::{AssetSource, FsSource};

/// Cached volumes keyed by logical file name (without extension).
///
/// The map lock is never held during I/O or decoding. Two threads missing the
/// same key at once may both decode it; the first result inserted is kept and
/// returned to both, so every caller ends up with the same shared volume.
///
/// Call [`VolumeCache::shutdown`] before dropping the cache.
pub struct VolumeCache {
    volumes: Mutex<HashMap<String, Option<Arc<RawVolume>>>>,
    formats: FormatRegistry,
    source: Box<dyn AssetSource>,
    shut_down: AtomicBool,
}

impl VolumeCache {
    pub fn new(source: Box<dyn AssetSource>, formats: FormatRegistry) -> Self {
        Self {
            volumes: Mutex::new(HashMap::new()),
            formats,
            source,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Cache reading from the filesystem with the default formats
    pub fn with_filesystem() -> Self {
        Self::new(Box::new(FsSource::new()), FormatRegistry::with_defaults())
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Option<Arc<RawVolume>>>> {
        self.volumes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load `filename`, trying every registered extension in priority order.
    ///
    /// Returns the cached volume (or cached failure) when the key was seen
    /// before. Sub-volumes of a multi-volume asset are merged into one.
    pub fn load_volume(&self, filename: &str, palette: &Palette) -> Option<Arc<RawVolume>> {
        debug_assert!(!self.is_shut_down(), "volume cache used after shutdown");

        if let Some(entry) = self.lock().get(filename) {
            log::debug!("Volume cache hit for {filename}");
            return entry.clone();
        }

        let loaded = self.load_from_source(filename, palette).map(Arc::new);
        if loaded.is_none() {
            log::warn!("Failed to load volume {filename}");
        }

        self.lock().entry(filename.to_string()).or_insert(loaded).clone()
    }

    /// Candidate paths in probing order: the name itself if it already carries
    /// a registered extension, then `<filename>.<ext>` for each format.
    fn candidates(&self, filename: &str) -> Vec<(PathBuf, usize)> {
        let mut candidates = Vec::new();
        let own_extension = Path::new(filename).extension().and_then(|e| e.to_str());
        for (index, format) in self.formats.iter().enumerate() {
            if own_extension.is_some_and(|ext| ext.eq_ignore_ascii_case(format.extension())) {
                candidates.insert(0, (PathBuf::from(filename), index));
            }
            candidates.push((PathBuf::from(format!("{filename}.{}", format.extension())), index));
        }
        candidates
    }

    fn load_from_source(&self, filename: &str, palette: &Palette) -> Option<RawVolume> {
        let (path, index) = self
            .candidates(filename)
            .into_iter()
            .find(|(path, _)| self.source.exists(path))?;
        let format = self.formats.iter().nth(index)?;

        let data = match self.source.read(&path) {
            Ok(data) => data,
            Err(e) => {
                log::error!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };
        let mut volumes = match format.load(&data, palette) {
            Ok(volumes) => volumes,
            Err(e) => {
                log::error!("Failed to decode {}: {}", path.display(), e);
                return None;
            }
        };

        let volume = if volumes.len() == 1 {
            volumes.pop()
        } else {
            let bounds = volumes.iter().fold(Region::INVALID, |acc, v| acc.union(v.region()));
            if bounds.checked_voxel_count().is_none_or(|count| count > MAX_VOLUME_VOXELS) {
                log::error!(
                    "Merged volumes of {} span too large a region {bounds}",
                    path.display()
                );
                return None;
            }
            RawVolume::merge(&volumes)
        };
        match &volume {
            Some(v) => log::info!("Loaded volume {} with region {}", path.display(), v.region()),
            None => log::error!("{} contains no volumes", path.display()),
        }
        volume
    }

    /// Drop the entry for `filename` and hand its volume to the caller.
    ///
    /// Returns `None` if there was no entry or only a cached failure.
    pub fn remove_volume(&self, filename: &str) -> Option<Arc<RawVolume>> {
        self.lock().remove(filename).flatten()
    }

    /// Drop the entry for `filename`, releasing the cache's reference.
    ///
    /// Returns true if an entry (including a cached failure) existed.
    pub fn delete_volume(&self, filename: &str) -> bool {
        self.lock().remove(filename).is_some()
    }

    /// True if `filename` has an entry, successful or not
    pub fn contains(&self, filename: &str) -> bool {
        self.lock().contains_key(filename)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Release every cached volume
    pub fn shutdown(&self) {
        let mut volumes = self.lock();
        log::debug!("Shutting down volume cache with {} entries", volumes.len());
        volumes.clear();
        self.shut_down.store(true, Ordering::Release);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for VolumeCache {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(
                self.lock().is_empty(),
                "volume cache dropped with entries, call shutdown() first"
            );
        }
    }
}
