//! Sight-ray intersection with a gridded elevation model.
//!
//! The ray is marched outward from the observer's eye in fixed steps along
//! its own length. The first sample whose altitude is at or below the
//! interpolated terrain ends the search; the crossing is then optionally
//! refined by linear interpolation against the previous above-ground sample.

use crate::core::raster::Raster;
use crate::types::{IntersectionError, IntersectionResult, Observer, SampleError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default search radius along the sight ray (meters)
pub const DEFAULT_MAX_VIEW_DISTANCE: f64 = 1000.0;

/// What the march does when a sample touches a no-data cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoDataPolicy {
    /// Step over the gap and keep searching
    Skip,
    /// End the search as if the view distance were exhausted
    Stop,
}

/// Line-of-sight search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SightParams {
    /// Maximum distance to search, measured along the sight ray (slant
    /// range from the eye), not horizontally over the ground
    pub max_view_distance: f64,
    /// Step along the ray; `None` uses one cell width of the raster
    pub step_length: Option<f64>,
    /// Handling of no-data cells met mid-march
    pub nodata_policy: NoDataPolicy,
    /// Interpolate the crossing between the last two samples
    pub refine: bool,
}

impl Default for SightParams {
    fn default() -> Self {
        Self {
            max_view_distance: DEFAULT_MAX_VIEW_DISTANCE,
            step_length: None,
            nodata_policy: NoDataPolicy::Skip,
            refine: true,
        }
    }
}

impl SightParams {
    /// Parameters with the given search radius and defaults otherwise
    pub fn with_max_view_distance(max_view_distance: f64) -> Self {
        Self {
            max_view_distance,
            ..Self::default()
        }
    }
}

/// Observer eye point and unit sight direction in world coordinates
#[derive(Debug, Clone, Copy)]
struct SightRay {
    origin: [f64; 3],
    direction: [f64; 3],
}

impl SightRay {
    fn new(observer: &Observer, ground_elevation: f64) -> Self {
        let bearing = observer.bearing.rem_euclid(360.0).to_radians();
        let tilt = observer.tilt.to_radians();
        let horizontal = tilt.cos();

        Self {
            origin: [
                observer.easting,
                observer.northing,
                ground_elevation + observer.eye_height,
            ],
            // Compass bearing: 0 = north (+y), 90 = east (+x)
            direction: [bearing.sin() * horizontal, bearing.cos() * horizontal, tilt.sin()],
        }
    }

    fn point_at(&self, distance: f64) -> [f64; 3] {
        [
            self.origin[0] + self.direction[0] * distance,
            self.origin[1] + self.direction[1] * distance,
            self.origin[2] + self.direction[2] * distance,
        ]
    }
}

/// One ray position with the terrain height beneath it
#[derive(Debug, Clone, Copy, PartialEq)]
struct RaySample {
    distance: f64,
    point: [f64; 3],
    terrain: f64,
}

impl RaySample {
    /// Ray altitude above terrain; non-positive means at or below ground
    fn clearance(&self) -> f64 {
        self.point[2] - self.terrain
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MarchState {
    Searching,
    Refining { above: RaySample, below: RaySample },
    Found(RaySample),
    Exhausted,
}

/// Line-of-sight engine over a shared, read-only raster
#[derive(Debug, Clone)]
pub struct LineOfSight {
    raster: Arc<Raster>,
    params: SightParams,
}

impl LineOfSight {
    /// Create an engine with default parameters
    pub fn new(raster: Arc<Raster>) -> Self {
        Self::with_params(raster, SightParams::default())
    }

    /// Create an engine with custom parameters
    pub fn with_params(raster: Arc<Raster>, params: SightParams) -> Self {
        Self { raster, params }
    }

    pub fn raster(&self) -> &Arc<Raster> {
        &self.raster
    }

    pub fn params(&self) -> &SightParams {
        &self.params
    }

    /// Find the first terrain crossing of the observer's sight ray
    pub fn intersect(&self, observer: &Observer) -> Result<IntersectionResult, IntersectionError> {
        intersect_raster(&self.raster, observer, &self.params)
    }

    /// Evaluate independent queries, preserving input order
    pub fn intersect_many(
        &self,
        observers: &[Observer],
    ) -> Vec<Result<IntersectionResult, IntersectionError>> {
        log::debug!("Running {} line-of-sight queries against {}", observers.len(), self.raster);

        #[cfg(feature = "parallel")]
        let results: Vec<_> = {
            use rayon::prelude::*;
            observers.par_iter().map(|o| self.intersect(o)).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let results: Vec<_> = observers.iter().map(|o| self.intersect(o)).collect();

        results
    }
}

/// Find where a sight ray first meets the terrain.
///
/// Bearing is in degrees clockwise from north, tilt in degrees from
/// horizontal (negative looks down), eye height in meters above the ground
/// at the observer. Fails with [`IntersectionError::NoIntersection`] when
/// nothing is hit within `max_view_distance`.
pub fn find_intersection(
    easting: f64,
    northing: f64,
    bearing: f64,
    tilt: f64,
    eye_height: f64,
    raster: &Raster,
    max_view_distance: f64,
) -> Result<IntersectionResult, IntersectionError> {
    let observer = Observer::new(easting, northing, eye_height, bearing, tilt);
    intersect_raster(raster, &observer, &SightParams::with_max_view_distance(max_view_distance))
}

/// Core march shared by the engine and the free function
pub fn intersect_raster(
    raster: &Raster,
    observer: &Observer,
    params: &SightParams,
) -> Result<IntersectionResult, IntersectionError> {
    validate(observer, params)?;
    let step = params.step_length.unwrap_or(raster.params().cell_size);
    if !step.is_finite() || step <= 0.0 {
        return Err(IntersectionError::InvalidObserver(format!(
            "step length must be positive and finite, got {}",
            step
        )));
    }

    let ground = raster
        .sample(observer.easting, observer.northing)
        .map_err(IntersectionError::ObserverOffGrid)?;
    let ray = SightRay::new(observer, ground);

    log::debug!(
        "Sight ray from ({:.3}, {:.3}, {:.3}) bearing {:.2} tilt {:.2}, step {}, max {}",
        ray.origin[0],
        ray.origin[1],
        ray.origin[2],
        observer.bearing,
        observer.tilt,
        step,
        params.max_view_distance
    );

    let mut state = MarchState::Searching;
    let mut previous: Option<RaySample> = None;
    let mut index: u64 = 0;

    loop {
        state = match state {
            MarchState::Searching => {
                // Distances are index * step so every search radius visits the same samples
                let distance = index as f64 * step;
                index += 1;

                if distance > params.max_view_distance {
                    MarchState::Exhausted
                } else {
                    let point = ray.point_at(distance);
                    match raster.sample(point[0], point[1]) {
                        Ok(terrain) => {
                            let sample = RaySample { distance, point, terrain };
                            log::trace!(
                                "d={:.3} altitude={:.3} terrain={:.3}",
                                distance,
                                point[2],
                                terrain
                            );

                            if sample.clearance() <= 0.0 {
                                match previous {
                                    Some(above) if params.refine => MarchState::Refining {
                                        above,
                                        below: sample,
                                    },
                                    _ => MarchState::Found(sample),
                                }
                            } else {
                                previous = Some(sample);
                                MarchState::Searching
                            }
                        }
                        Err(SampleError::OutOfBounds { .. }) => {
                            log::warn!(
                                "Sight ray left the grid at d={:.3} ({:.3}, {:.3})",
                                distance,
                                point[0],
                                point[1]
                            );
                            MarchState::Exhausted
                        }
                        Err(SampleError::NoData { .. }) => match params.nodata_policy {
                            NoDataPolicy::Skip => {
                                // Never interpolate a crossing across a gap
                                previous = None;
                                MarchState::Searching
                            }
                            NoDataPolicy::Stop => {
                                log::debug!("No-data cell at d={:.3}, stopping search", distance);
                                MarchState::Exhausted
                            }
                        },
                    }
                }
            }
            MarchState::Refining { above, below } => {
                MarchState::Found(refine_crossing(raster, &ray, &above, &below))
            }
            MarchState::Found(sample) => {
                let result = build_result(&ray, observer, &sample);
                log::debug!("Intersection found: {:?}", result);
                return Ok(result);
            }
            MarchState::Exhausted => {
                log::debug!("No intersection within {}", params.max_view_distance);
                return Err(IntersectionError::NoIntersection {
                    max_view_distance: params.max_view_distance,
                });
            }
        };
    }
}

fn validate(observer: &Observer, params: &SightParams) -> Result<(), IntersectionError> {
    let fields = [
        ("easting", observer.easting),
        ("northing", observer.northing),
        ("eye height", observer.eye_height),
        ("bearing", observer.bearing),
        ("tilt", observer.tilt),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(IntersectionError::InvalidObserver(format!(
                "{} must be finite, got {}",
                name, value
            )));
        }
    }

    if !(-90.0..=90.0).contains(&observer.tilt) {
        return Err(IntersectionError::InvalidObserver(format!(
            "tilt must lie within [-90, 90] degrees, got {}",
            observer.tilt
        )));
    }

    if !params.max_view_distance.is_finite() || params.max_view_distance <= 0.0 {
        return Err(IntersectionError::InvalidObserver(format!(
            "maximum view distance must be positive and finite, got {}",
            params.max_view_distance
        )));
    }

    Ok(())
}

/// Linear interpolation of ray clearance between the bracketing samples.
///
/// Falls back to the crossing sample if the interpolated point cannot be
/// sampled.
fn refine_crossing(raster: &Raster, ray: &SightRay, above: &RaySample, below: &RaySample) -> RaySample {
    let a = above.clearance();
    let b = below.clearance();
    let fraction = a / (a - b);
    let distance = above.distance + fraction * (below.distance - above.distance);
    let point = ray.point_at(distance);

    match raster.sample(point[0], point[1]) {
        Ok(terrain) => RaySample { distance, point, terrain },
        Err(e) => {
            log::debug!("Refined crossing not sampleable ({}), keeping step sample", e);
            *below
        }
    }
}

fn build_result(ray: &SightRay, observer: &Observer, sample: &RaySample) -> IntersectionResult {
    let dx = sample.point[0] - observer.easting;
    let dy = sample.point[1] - observer.northing;
    let dz = sample.terrain - ray.origin[2];

    IntersectionResult {
        ground_distance: dx.hypot(dy),
        terrain_elevation: sample.terrain,
        intersection_easting: sample.point[0],
        intersection_northing: sample.point[1],
        slant_distance: (dx * dx + dy * dy + dz * dz).sqrt(),
    }
}
