use crate::types::{GridParameters, RasterError};
use ndarray::Array2;
use std::fmt;
use std::path::{Path, PathBuf};

/// Gridded elevation model: header parameters plus an immutable height grid.
///
/// Row 0 is the northern-most row. The grid is never mutated after
/// construction, so a `Raster` behind an `Arc` can be sampled from any
/// number of threads.
#[derive(Debug, Clone)]
pub struct Raster {
    params: GridParameters,
    heights: Array2<f64>,
    source: Option<PathBuf>,
}

impl Raster {
    /// Build a raster from parameters and an in-memory height grid
    pub fn new(params: GridParameters, heights: Array2<f64>) -> Result<Self, RasterError> {
        Self::with_source(params, heights, None)
    }

    /// Build a raster from nested rows, northern-most row first
    pub fn from_rows(params: GridParameters, rows: Vec<Vec<f64>>) -> Result<Self, RasterError> {
        let actual: usize = rows.iter().map(|r| r.len()).sum();
        if rows.len() != params.num_rows || rows.iter().any(|r| r.len() != params.num_cols) {
            return Err(RasterError::Shape {
                expected: params.cell_count(),
                actual,
            });
        }

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let heights = Array2::from_shape_vec((params.num_rows, params.num_cols), flat)
            .map_err(|_| RasterError::Shape {
                expected: params.cell_count(),
                actual,
            })?;

        Self::new(params, heights)
    }

    pub(crate) fn with_source(
        params: GridParameters,
        heights: Array2<f64>,
        source: Option<PathBuf>,
    ) -> Result<Self, RasterError> {
        if heights.dim() != (params.num_rows, params.num_cols) {
            return Err(RasterError::Shape {
                expected: params.cell_count(),
                actual: heights.len(),
            });
        }

        Ok(Self {
            params,
            heights,
            source,
        })
    }

    pub fn params(&self) -> &GridParameters {
        &self.params
    }

    pub fn heights(&self) -> &Array2<f64> {
        &self.heights
    }

    /// File the raster was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Stored height at integer grid coordinates
    pub fn height_at(&self, row: usize, col: usize) -> Option<f64> {
        self.heights.get([row, col]).copied()
    }

    /// Sentinel cells and non-finite values both mean "no measurement"
    pub fn is_no_data(&self, value: f64) -> bool {
        !value.is_finite() || value == self.params.no_data_value
    }
}

impl fmt::Display for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(path) => write!(f, "{}", path.display()),
            None => write!(f, "in-memory raster"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(rows: usize, cols: usize) -> GridParameters {
        GridParameters::new(rows, cols, 0.0, 0.0, 1.0, -9999.0).unwrap()
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let result = Raster::new(params(2, 3), Array2::zeros((3, 2)));
        assert!(matches!(
            result,
            Err(RasterError::Shape { expected: 6, actual: 6 })
        ));

        let result = Raster::from_rows(params(2, 2), vec![vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(
            result,
            Err(RasterError::Shape { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_from_rows_keeps_row_order() {
        let raster = Raster::from_rows(params(2, 2), vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(raster.height_at(0, 1), Some(2.0));
        assert_eq!(raster.height_at(1, 0), Some(3.0));
        assert_eq!(raster.height_at(2, 0), None);
    }

    #[test]
    fn test_non_finite_heights_are_no_data() {
        let raster = Raster::new(params(1, 1), Array2::zeros((1, 1))).unwrap();
        assert!(raster.is_no_data(-9999.0));
        assert!(raster.is_no_data(f64::NAN));
        assert!(raster.is_no_data(f64::INFINITY));
        assert!(!raster.is_no_data(0.0));
    }

    #[test]
    fn test_display_names_source() {
        let raster = Raster::new(params(1, 1), Array2::zeros((1, 1))).unwrap();
        assert_eq!(raster.to_string(), "in-memory raster");
        assert!(raster.source().is_none());

        let raster = Raster::with_source(
            params(1, 1),
            Array2::zeros((1, 1)),
            Some(PathBuf::from("dsm/surface.asc")),
        )
        .unwrap();
        assert_eq!(raster.to_string(), "dsm/surface.asc");
    }
}
