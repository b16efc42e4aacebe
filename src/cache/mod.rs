//! Shared, load-once cache of volume assets and the formats it decodes

pub mod format;
pub mod source;
pub mod volume_cache;

pub use format::{FormatRegistry, JsonFormat, NativeFormat, VolumeFormat};
pub use source::{AssetSource, FsSource};
pub use volume_cache::VolumeCache;
