//! Paged voxel storage
//!
//! A [`PagedVolume`] addresses an unbounded voxel grid while keeping only a
//! bounded number of [`Chunk`]s in memory. Chunks are produced and persisted
//! through a [`Pager`].

pub mod budget;
pub mod chunk;
pub mod file_pager;
pub mod noise_pager;
pub mod pager;
pub mod paged_volume;
pub mod wrapper;

pub use budget::MemoryBudget;
pub use chunk::{Chunk, ChunkCoord};
pub use file_pager::FilePager;
pub use noise_pager::{NoiseParams, NoisePager};
pub use pager::{EmptyPager, Pager};
pub use paged_volume::{ChunkBudget, PagedVolume, PagedVolumeConfig};
pub use wrapper::{PagedVolumeWrapper, Sampler};
