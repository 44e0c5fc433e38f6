//! I/O layer: GDAL-backed band reads, GeoTIFF index writers with their tags,
//! the CMR XML metadata rewriter and the STAC item builder.
pub mod cmr;
pub mod gdal;
pub use self::gdal::{GridAligner, read_band_grid, read_geometry, read_tags};

pub mod stac;
pub mod writers;
