use serde::{Deserialize, Serialize};

/// Raster header parameters of a gridded elevation model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridParameters {
    pub num_rows: usize,
    pub num_cols: usize,
    /// World X of the lower-left cell corner
    pub xll_corner: f64,
    /// World Y of the lower-left cell corner
    pub yll_corner: f64,
    /// Side length of one cell in world units
    pub cell_size: f64,
    /// Sentinel meaning "no measurement"
    pub no_data_value: f64,
}

impl GridParameters {
    /// Validate header values and build the parameter record
    pub fn new(
        num_rows: usize,
        num_cols: usize,
        xll_corner: f64,
        yll_corner: f64,
        cell_size: f64,
        no_data_value: f64,
    ) -> Result<Self, RasterError> {
        if num_rows < 1 || num_cols < 1 {
            return Err(RasterError::InvalidParameters(format!(
                "grid must have at least one row and column, got {}x{}",
                num_rows, num_cols
            )));
        }
        let cells = num_rows
            .checked_mul(num_cols)
            .filter(|&n| n <= isize::MAX as usize);
        if cells.is_none() {
            return Err(RasterError::InvalidParameters(format!(
                "grid of {}x{} cells is too large to address",
                num_rows, num_cols
            )));
        }
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(RasterError::InvalidParameters(format!(
                "cell size must be positive and finite, got {}",
                cell_size
            )));
        }
        if !xll_corner.is_finite() || !yll_corner.is_finite() {
            return Err(RasterError::InvalidParameters(
                "lower-left corner must be finite".to_string(),
            ));
        }

        Ok(Self {
            num_rows,
            num_cols,
            xll_corner,
            yll_corner,
            cell_size,
            no_data_value,
        })
    }

    pub fn cell_count(&self) -> usize {
        self.num_rows.saturating_mul(self.num_cols)
    }

    /// Easting of the last column's sample position
    pub fn x_max(&self) -> f64 {
        self.xll_corner + (self.num_cols - 1) as f64 * self.cell_size
    }

    /// Northing of the first (northern-most) row's sample position
    pub fn y_max(&self) -> f64 {
        self.yll_corner + (self.num_rows - 1) as f64 * self.cell_size
    }

    /// Whether a world coordinate lies inside the sampled extent
    pub fn contains(&self, easting: f64, northing: f64) -> bool {
        easting >= self.xll_corner
            && easting <= self.x_max()
            && northing >= self.yll_corner
            && northing <= self.y_max()
    }
}

/// Observer position and sight direction for a single query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    pub easting: f64,
    pub northing: f64,
    /// Eye height above local terrain (meters)
    pub eye_height: f64,
    /// Degrees clockwise from north
    pub bearing: f64,
    /// Degrees from horizontal, negative is downward
    pub tilt: f64,
}

impl Observer {
    pub fn new(easting: f64, northing: f64, eye_height: f64, bearing: f64, tilt: f64) -> Self {
        Self {
            easting,
            northing,
            eye_height,
            bearing,
            tilt,
        }
    }
}

/// Geometry of a sight ray's first terrain crossing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntersectionResult {
    /// Horizontal distance from the observer to the crossing
    pub ground_distance: f64,
    /// Interpolated terrain height at the crossing
    pub terrain_elevation: f64,
    pub intersection_easting: f64,
    pub intersection_northing: f64,
    /// 3-D distance from the eye point to the crossing
    pub slant_distance: f64,
}

impl IntersectionResult {
    /// Fields in the order ground distance, elevation, easting, northing, slant distance
    pub fn to_array(&self) -> [f64; 5] {
        [
            self.ground_distance,
            self.terrain_elevation,
            self.intersection_easting,
            self.intersection_northing,
            self.slant_distance,
        ]
    }
}

/// Error types for raster ingestion
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster format at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Height grid has {actual} cells, parameters describe {expected}")]
    Shape { expected: usize, actual: usize },

    #[error("Invalid grid parameters: {0}")]
    InvalidParameters(String),
}

/// Error types for height sampling
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum SampleError {
    #[error("({easting}, {northing}) lies outside the grid")]
    OutOfBounds { easting: f64, northing: f64 },

    #[error("no-data cell contributes to ({easting}, {northing})")]
    NoData { easting: f64, northing: f64 },
}

/// Error types for a line-of-sight query
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntersectionError {
    #[error("No intersection within maximum view distance {max_view_distance}")]
    NoIntersection { max_view_distance: f64 },

    #[error("Cannot establish observer ground height: {0}")]
    ObserverOffGrid(SampleError),

    #[error("Invalid observer state: {0}")]
    InvalidObserver(String),
}

impl IntersectionError {
    /// True for the expected "nothing hit within range" outcome
    pub fn is_no_intersection(&self) -> bool {
        matches!(self, IntersectionError::NoIntersection { .. })
    }
}

/// Any failure while loading a raster or querying it
#[derive(Debug, thiserror::Error)]
pub enum LosError {
    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error(transparent)]
    Intersection(#[from] IntersectionError),
}

/// Result type for line-of-sight operations
pub type LosResult<T> = Result<T, LosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_reject_degenerate_grid() {
        assert!(matches!(
            GridParameters::new(0, 3, 0.0, 0.0, 1.0, -9999.0),
            Err(RasterError::InvalidParameters(_))
        ));
        assert!(matches!(
            GridParameters::new(3, 3, 0.0, 0.0, 0.0, -9999.0),
            Err(RasterError::InvalidParameters(_))
        ));
        assert!(matches!(
            GridParameters::new(3, 3, 0.0, 0.0, f64::NAN, -9999.0),
            Err(RasterError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_parameters_reject_unaddressable_grid() {
        let half = 1usize << (usize::BITS / 2);
        assert!(matches!(
            GridParameters::new(usize::MAX, 2, 0.0, 0.0, 1.0, -9999.0),
            Err(RasterError::InvalidParameters(_))
        ));
        assert!(matches!(
            GridParameters::new(half, half, 0.0, 0.0, 1.0, -9999.0),
            Err(RasterError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_parameters_keep_fractional_cell_size() {
        let params = GridParameters::new(4, 5, 100.0, 200.0, 0.5, -9999.0).unwrap();
        assert_eq!(params.cell_size, 0.5);
        assert_eq!(params.cell_count(), 20);
        assert_eq!(params.x_max(), 102.0);
        assert_eq!(params.y_max(), 201.5);
        assert!(params.contains(101.0, 201.0));
        assert!(!params.contains(102.5, 201.0));
    }

    #[test]
    fn test_no_intersection_discriminant() {
        let exhausted = IntersectionError::NoIntersection { max_view_distance: 10.0 };
        let invalid = IntersectionError::InvalidObserver("tilt".to_string());
        assert!(exhausted.is_no_intersection());
        assert!(!invalid.is_no_intersection());

        let wrapped: LosError = exhausted.into();
        assert!(matches!(
            wrapped,
            LosError::Intersection(IntersectionError::NoIntersection { .. })
        ));
    }
}
