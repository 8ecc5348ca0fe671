use crate::core::raster::Raster;
use crate::types::SampleError;

impl Raster {
    /// Fractional (row, col) grid position of a world coordinate.
    ///
    /// Row is measured down from the northern edge. Returns `None` outside
    /// `[0, num_rows - 1] x [0, num_cols - 1]`.
    pub fn grid_position(&self, easting: f64, northing: f64) -> Option<(f64, f64)> {
        let p = self.params();
        let col = (easting - p.xll_corner) / p.cell_size;
        let row = (p.num_rows - 1) as f64 - (northing - p.yll_corner) / p.cell_size;

        // NaN fails both range checks
        if !(0.0..=(p.num_cols - 1) as f64).contains(&col)
            || !(0.0..=(p.num_rows - 1) as f64).contains(&row)
        {
            return None;
        }

        Some((row, col))
    }

    /// Terrain elevation at a world coordinate using bilinear interpolation.
    ///
    /// Only cells with a non-zero interpolation weight contribute, so an
    /// exact grid coordinate returns the stored value unchanged and a no-data
    /// neighbour with zero weight is ignored.
    pub fn sample(&self, easting: f64, northing: f64) -> Result<f64, SampleError> {
        let (row, col) = self
            .grid_position(easting, northing)
            .ok_or(SampleError::OutOfBounds { easting, northing })?;

        let p = self.params();
        let r0 = row.floor() as usize;
        let c0 = col.floor() as usize;
        let r1 = (r0 + 1).min(p.num_rows - 1);
        let c1 = (c0 + 1).min(p.num_cols - 1);

        let dy = row - r0 as f64;
        let dx = col - c0 as f64;

        let corners = [
            (r0, c0, (1.0 - dx) * (1.0 - dy)),
            (r0, c1, dx * (1.0 - dy)),
            (r1, c0, (1.0 - dx) * dy),
            (r1, c1, dx * dy),
        ];

        let heights = self.heights();
        let mut elevation = 0.0;
        for &(r, c, weight) in &corners {
            if weight == 0.0 {
                continue;
            }
            let value = heights[[r, c]];
            if self.is_no_data(value) {
                return Err(SampleError::NoData { easting, northing });
            }
            elevation += value * weight;
        }

        Ok(elevation)
    }
}
