//! In-memory band grids and their georeferencing.
use std::collections::HashMap;

use ndarray::Array2;

use crate::error::{Error, Result};

/// Geotransform used when a raster carries none.
pub const IDENTITY_GEOTRANSFORM: [f64; 6] = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Pixel grid and georeferencing shared by every band of a granule.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    /// Width (pixels) of the raster
    pub width: usize,
    /// Height (lines) of the raster
    pub height: usize,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// Projection in WKT format, empty when unknown
    pub projection: String,
}

impl GridGeometry {
    pub fn ungeoreferenced(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            geotransform: IDENTITY_GEOTRANSFORM,
            projection: String::new(),
        }
    }

    /// Shape as `(rows, cols)`, matching ndarray's convention.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Fails with `Alignment` unless `other` has the same shape and geotransform.
    pub fn ensure_aligned(&self, other: &GridGeometry, what: &str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::Alignment(format!(
                "{}: expected {}x{} pixels, got {}x{}",
                what, self.height, self.width, other.height, other.width
            )));
        }
        if self.geotransform != other.geotransform {
            return Err(Error::Alignment(format!(
                "{}: geotransform {:?} differs from {:?}",
                what, other.geotransform, self.geotransform
            )));
        }
        Ok(())
    }
}

/// One spectral band of a granule.
#[derive(Debug, Clone)]
pub struct BandGrid {
    pub data: Array2<f64>,
    /// Per-band nodata value, if the raster declares one
    pub fill_value: Option<f64>,
    pub geometry: GridGeometry,
    /// Dataset metadata items of the source raster
    pub tags: HashMap<String, String>,
}

impl BandGrid {
    /// Grid without georeferencing, mostly useful for in-memory processing.
    pub fn new(data: Array2<f64>, fill_value: Option<f64>) -> Self {
        let (rows, cols) = data.dim();
        Self {
            data,
            fill_value,
            geometry: GridGeometry::ungeoreferenced(cols, rows),
            tags: HashMap::new(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn is_fill(&self, value: f64) -> bool {
        self.fill_value == Some(value)
    }

    /// Scale stored digital numbers into reflectance, leaving fill pixels untouched.
    pub fn to_reflectance(&self, scale: f64) -> BandGrid {
        let data = self
            .data
            .mapv(|v| if self.is_fill(v) { v } else { v * scale });
        BandGrid {
            data,
            fill_value: self.fill_value,
            geometry: self.geometry.clone(),
            tags: self.tags.clone(),
        }
    }
}
