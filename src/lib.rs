//! Sightline: line-of-sight intersection against gridded elevation models
//!
//! Given an observer's position, eye height, bearing and tilt, casts a sight
//! ray over an ASCII-grid DEM and reports where it first meets the terrain.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    GridParameters, Observer, IntersectionResult, RasterError, SampleError,
    IntersectionError, LosError, LosResult
};

pub use io::AsciiGridReader;
pub use crate::core::{Raster, LineOfSight, SightParams, NoDataPolicy, find_intersection};
