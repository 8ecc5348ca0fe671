use crate::core::raster::Raster;
use crate::types::{GridParameters, RasterError};
use ndarray::Array2;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::Path;
use std::sync::OnceLock;

/// Header labels in the order they must appear
const HEADER_LABELS: [&str; 6] = [
    "ncols",
    "nrows",
    "xllcorner",
    "yllcorner",
    "cellsize",
    "nodata_value",
];

/// Upper bound on cells reserved before any data row has been read
const MAX_PREALLOCATED_CELLS: usize = 1 << 20;

/// `<label> <value>` header line
fn header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_]+)\s+(\S+)\s*$").expect("header pattern is a valid regex")
    })
}

/// Reader for ESRI ASCII grid rasters
pub struct AsciiGridReader;

impl AsciiGridReader {
    /// Read a raster from a file, decompressing `.gz` and `.zip` sources
    pub fn read_path<P: AsRef<Path>>(path: P) -> Result<Raster, RasterError> {
        let path = path.as_ref();
        log::info!("Reading ASCII grid from: {}", path.display());

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let (params, heights) = match extension.as_deref() {
            Some("gz") => {
                use flate2::read::GzDecoder;
                let file = File::open(path)?;
                Self::parse(BufReader::new(GzDecoder::new(file)))?
            }
            Some("zip") => {
                let contents = Self::extract_from_zip(path)?;
                Self::parse(Cursor::new(contents))?
            }
            _ => {
                let file = File::open(path)?;
                Self::parse(BufReader::new(file))?
            }
        };

        log::info!(
            "Loaded {}x{} grid, cell size {}",
            params.num_cols,
            params.num_rows,
            params.cell_size
        );

        Raster::with_source(params, heights, Some(path.to_path_buf()))
    }

    /// Read a raster from any buffered text source
    pub fn read_from<R: BufRead>(reader: R) -> Result<Raster, RasterError> {
        let (params, heights) = Self::parse(reader)?;
        Raster::new(params, heights)
    }

    /// Parse the six-line header and the height rows
    pub fn parse<R: BufRead>(reader: R) -> Result<(GridParameters, Array2<f64>), RasterError> {
        let mut lines = reader.lines();
        let header_pattern = header_pattern();

        let mut header = [0.0f64; 6];
        for (i, label) in HEADER_LABELS.iter().enumerate() {
            let line_no = i + 1;
            let line = lines.next().ok_or_else(|| RasterError::Format {
                line: line_no,
                message: format!("missing header field '{}'", label),
            })??;

            let captures = header_pattern.captures(&line).ok_or_else(|| RasterError::Format {
                line: line_no,
                message: format!("expected '{} <value>', found '{}'", label, line.trim()),
            })?;

            if !captures[1].eq_ignore_ascii_case(label) {
                return Err(RasterError::Format {
                    line: line_no,
                    message: format!("expected header field '{}', found '{}'", label, &captures[1]),
                });
            }

            header[i] = captures[2].parse::<f64>().map_err(|_| RasterError::Format {
                line: line_no,
                message: format!("'{}' is not a number for field '{}'", &captures[2], label),
            })?;
        }

        let num_cols = Self::dimension(header[0], 1, "ncols")?;
        let num_rows = Self::dimension(header[1], 2, "nrows")?;
        let params = GridParameters::new(num_rows, num_cols, header[2], header[3], header[4], header[5])?;
        log::debug!("Grid header: {:?}", params);

        // Grow with the data actually present rather than trusting the header
        let mut values: Vec<f64> = Vec::with_capacity(params.cell_count().min(MAX_PREALLOCATED_CELLS));
        let mut row = 0;
        let mut line_no = HEADER_LABELS.len();

        for line in lines {
            let line = line?;
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            if row == num_rows {
                log::warn!("Ignoring content after {} data rows (line {})", num_rows, line_no);
                break;
            }

            let mut count = 0;
            for token in line.split_whitespace() {
                if count == num_cols {
                    return Err(RasterError::Format {
                        line: line_no,
                        message: format!("more than {} values in data row", num_cols),
                    });
                }
                values.push(token.parse::<f64>().map_err(|_| RasterError::Format {
                    line: line_no,
                    message: format!("'{}' is not a valid number", token),
                })?);
                count += 1;
            }

            if count != num_cols {
                return Err(RasterError::Format {
                    line: line_no,
                    message: format!("expected {} values, found {}", num_cols, count),
                });
            }
            row += 1;
        }

        if row != num_rows {
            return Err(RasterError::Format {
                line: line_no,
                message: format!("expected {} data rows, found {}", num_rows, row),
            });
        }

        let heights = Array2::from_shape_vec((num_rows, num_cols), values).map_err(|e| {
            RasterError::Format {
                line: line_no,
                message: format!("Failed to shape height grid: {}", e),
            }
        })?;

        Ok((params, heights))
    }

    fn dimension(value: f64, line: usize, label: &str) -> Result<usize, RasterError> {
        if value.fract() != 0.0 || value < 1.0 {
            return Err(RasterError::Format {
                line,
                message: format!("'{}' must be a positive integer, got {}", label, value),
            });
        }
        Ok(value as usize)
    }

    /// Pull the first ASCII grid entry out of a ZIP archive
    fn extract_from_zip(path: &Path) -> Result<Vec<u8>, RasterError> {
        use zip::ZipArchive;

        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| RasterError::Archive(format!("Failed to open ZIP archive: {}", e)))?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| RasterError::Archive(format!("Failed to read ZIP entry {}: {}", i, e)))?;

            let name = entry.name().to_ascii_lowercase();
            if name.ends_with(".asc") || name.ends_with(".txt") {
                log::debug!("Extracting grid file: {}", entry.name());
                let mut buffer = Vec::new();
                entry.read_to_end(&mut buffer)?;
                return Ok(buffer);
            }
        }

        Err(RasterError::Archive("No ASCII grid found in ZIP archive".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_GRID: &str = "ncols        3
nrows        2
xllcorner    1000.0
yllcorner    2000.0
cellsize     0.5
NODATA_value -9999
1 2 3
4 5 6
";

    #[test]
    fn test_parse_header_and_rows() {
        let (params, heights) = AsciiGridReader::parse(Cursor::new(SMALL_GRID)).unwrap();

        assert_eq!(params.num_cols, 3);
        assert_eq!(params.num_rows, 2);
        assert_eq!(params.xll_corner, 1000.0);
        assert_eq!(params.yll_corner, 2000.0);
        assert_eq!(params.cell_size, 0.5);
        assert_eq!(params.no_data_value, -9999.0);
        assert_eq!(heights.dim(), (2, 3));
        assert_eq!(heights[[0, 0]], 1.0);
        assert_eq!(heights[[1, 2]], 6.0);
    }

    #[test]
    fn test_header_tolerates_extra_whitespace() {
        let text = "  NCOLS 1\nnrows\t1\nxllcorner 0\nyllcorner 0\ncellsize 1\nnodata_value -1\n  7.5  \n";
        let (params, heights) = AsciiGridReader::parse(Cursor::new(text)).unwrap();
        assert_eq!(params.cell_count(), 1);
        assert_eq!(heights[[0, 0]], 7.5);
    }

    #[test]
    fn test_wrong_header_order_reports_line() {
        let text = "nrows 2\nncols 3\nxllcorner 0\nyllcorner 0\ncellsize 1\nNODATA_value -9999\n";
        match AsciiGridReader::parse(Cursor::new(text)) {
            Err(RasterError::Format { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_short_row_is_format_error() {
        let text = SMALL_GRID.replace("4 5 6", "4 5");
        match AsciiGridReader::parse(Cursor::new(text)) {
            Err(RasterError::Format { line, .. }) => assert_eq!(line, 8),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_long_row_is_format_error() {
        let text = SMALL_GRID.replace("1 2 3", "1 2 3 4");
        assert!(matches!(
            AsciiGridReader::parse(Cursor::new(text)),
            Err(RasterError::Format { line: 7, .. })
        ));
    }

    #[test]
    fn test_bad_token_is_format_error() {
        let text = SMALL_GRID.replace("4 5 6", "4 five 6");
        assert!(matches!(
            AsciiGridReader::parse(Cursor::new(text)),
            Err(RasterError::Format { line: 8, .. })
        ));
    }

    #[test]
    fn test_missing_rows_is_format_error() {
        let text = SMALL_GRID.replace("4 5 6\n", "");
        assert!(matches!(
            AsciiGridReader::parse(Cursor::new(text)),
            Err(RasterError::Format { .. })
        ));
    }

    #[test]
    fn test_fractional_ncols_rejected() {
        let text = SMALL_GRID.replace("ncols        3", "ncols        3.5");
        assert!(matches!(
            AsciiGridReader::parse(Cursor::new(text)),
            Err(RasterError::Format { line: 1, .. })
        ));
    }

    #[test]
    fn test_oversized_header_rejected_without_allocating() {
        let text = SMALL_GRID
            .replace("ncols        3", "ncols        1e10")
            .replace("nrows        2", "nrows        1e10");
        assert!(matches!(
            AsciiGridReader::parse(Cursor::new(text)),
            Err(RasterError::InvalidParameters(_))
        ));

        // Representable but huge: fails on the first short row
        let text = "ncols 100000\nnrows 100000\nxllcorner 0\nyllcorner 0\ncellsize 1\nNODATA_value -9999\n1\n";
        assert!(matches!(
            AsciiGridReader::parse(Cursor::new(text)),
            Err(RasterError::Format { line: 7, .. })
        ));
    }

    #[test]
    fn test_nan_tokens_are_read_as_no_data() {
        let text = SMALL_GRID.replace("4 5 6", "4 nan 6");
        let raster = AsciiGridReader::read_from(Cursor::new(text)).unwrap();
        assert!(raster.height_at(1, 1).unwrap().is_nan());
        // Row 1 is the southern row, column 1 at easting 1000.5
        assert!(matches!(
            raster.sample(1000.5, 2000.0),
            Err(crate::types::SampleError::NoData { .. })
        ));
        assert_eq!(raster.sample(1000.0, 2000.0).unwrap(), 4.0);
    }

    #[test]
    fn test_nan_nodata_header_still_detects_gaps() {
        let text = SMALL_GRID
            .replace("NODATA_value -9999", "NODATA_value nan")
            .replace("1 2 3", "1 NaN 3");
        let raster = AsciiGridReader::read_from(Cursor::new(text)).unwrap();
        assert!(raster.params().no_data_value.is_nan());
        assert!(matches!(
            raster.sample(1000.5, 2000.5),
            Err(crate::types::SampleError::NoData { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = AsciiGridReader::read_path("/nonexistent/surface.asc");
        assert!(matches!(result, Err(RasterError::Io(_))));
    }
}
