//! Extraction request queue and background meshing

pub mod queue;
pub mod scheduler;

pub use queue::{ExtractQueue, ExtractRegion};
pub use scheduler::{ExtractionJob, ExtractionResult, ExtractionScheduler};
