//! Core elevation model and line-of-sight modules

pub mod raster;
pub mod sampler;
pub mod line_of_sight;

// Re-export main types
pub use raster::Raster;
pub use line_of_sight::{
    LineOfSight, SightParams, NoDataPolicy, find_intersection, intersect_raster,
    DEFAULT_MAX_VIEW_DISTANCE
};
