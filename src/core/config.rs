//! Engine-level configuration loaded from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::paged::PagedVolumeConfig;
use crate::render::RendererConfig;

/// Aggregate configuration for the paged store and the renderer.
///
/// Every field has a default, so a partial JSON document such as
/// `{"renderer": {"mesh_size": 32}}` is valid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Chunk size and memory budget of paged volumes
    pub paged_volume: PagedVolumeConfig,
    /// Mesh tiling and extraction scheduling
    pub renderer: RendererConfig,
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the values that have structural constraints.
    pub fn validate(&self) -> Result<()> {
        self.paged_volume.validate()?;
        self.renderer.validate()
    }
}
