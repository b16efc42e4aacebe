//! Mathematical utilities and data structures

pub mod aabb;
pub mod frustum;
pub mod region;

pub use aabb::Aabb;
pub use frustum::{Frustum, Plane};
pub use region::Region;
