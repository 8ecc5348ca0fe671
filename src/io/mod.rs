//! I/O modules for reading elevation rasters

pub mod ascii_grid;

pub use ascii_grid::AsciiGridReader;
