//! Voxpage - paged voxel volumes, a shared volume cache and threaded mesh extraction

pub mod core;
pub mod math;
pub mod voxel;
pub mod paged;
pub mod cache;
pub mod mesh;
pub mod extract;
pub mod render;
