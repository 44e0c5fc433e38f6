//! GDAL-backed raster adapter: single-band reads with alignment checks and
//! metadata (tag) access.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use gdal::{Dataset, Metadata};
use ndarray::Array2;
use tracing::debug;

use crate::core::grid::{BandGrid, GridGeometry, IDENTITY_GEOTRANSFORM};
use crate::error::{Error, Result};

fn open(path: &Path) -> Result<Dataset> {
    Dataset::open(path).map_err(|e| Error::gdal(path, e))
}

/// Collect dataset metadata entries of the default domain.
fn dataset_tags(dataset: &Dataset) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    if let Some(entries) = dataset.metadata_domain("") {
        for entry in entries {
            if let Some((key, val)) = entry.split_once('=') {
                tags.insert(key.to_string(), val.to_string());
            }
        }
    }
    tags
}

/// Read a single-band raster into a [`BandGrid`].
///
/// Fails with `Io` when GDAL cannot open or read the file and with `Format`
/// when the raster does not hold exactly one non-empty band.
pub fn read_band_grid<P: AsRef<Path>>(path: P) -> Result<BandGrid> {
    let path = path.as_ref();
    let dataset = open(path)?;

    let bands = dataset.raster_count() as usize;
    if bands != 1 {
        return Err(Error::Format {
            path: path.to_path_buf(),
            reason: format!("expected a single band, found {}", bands),
        });
    }
    let (width, height) = dataset.raster_size();
    if width == 0 || height == 0 {
        return Err(Error::Format {
            path: path.to_path_buf(),
            reason: format!("empty raster {}x{}", width, height),
        });
    }

    let geotransform = dataset.geo_transform().unwrap_or(IDENTITY_GEOTRANSFORM);
    let projection = dataset.projection();

    let band = dataset.rasterband(1).map_err(|e| Error::gdal(path, e))?;
    let fill_value = band.no_data_value();
    let buf = band
        .read_as::<f64>((0, 0), (width, height), (width, height), None)
        .map_err(|e| Error::gdal(path, e))?;
    let data = Array2::from_shape_vec((height, width), buf.data().to_vec()).map_err(|e| {
        Error::Format {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    debug!(
        "Read {:?}: {}x{} nodata={:?}",
        path.file_name().unwrap_or_default(),
        width,
        height,
        fill_value
    );

    Ok(BandGrid {
        data,
        fill_value,
        geometry: GridGeometry {
            width,
            height,
            geotransform,
            projection,
        },
        tags: dataset_tags(&dataset),
    })
}

/// Read only the grid geometry of a raster.
pub fn read_geometry<P: AsRef<Path>>(path: P) -> Result<GridGeometry> {
    let dataset = open(path.as_ref())?;
    let (width, height) = dataset.raster_size();
    Ok(GridGeometry {
        width,
        height,
        geotransform: dataset.geo_transform().unwrap_or(IDENTITY_GEOTRANSFORM),
        projection: dataset.projection(),
    })
}

/// Read only the dataset metadata of a raster.
pub fn read_tags<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let dataset = open(path.as_ref())?;
    Ok(dataset_tags(&dataset))
}

/// Validates every grid of a run against the first one it sees.
#[derive(Debug, Default)]
pub struct GridAligner {
    reference: Option<(PathBuf, GridGeometry)>,
}

impl GridAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Geometry of the first grid checked, if any.
    pub fn reference(&self) -> Option<&GridGeometry> {
        self.reference.as_ref().map(|(_, g)| g)
    }

    pub fn check(&mut self, path: &Path, grid: &BandGrid) -> Result<()> {
        match &self.reference {
            Some((first, geometry)) => geometry.ensure_aligned(
                &grid.geometry,
                &format!("{:?} vs {:?}", path, first),
            ),
            None => {
                self.reference = Some((path.to_path_buf(), grid.geometry.clone()));
                Ok(())
            }
        }
    }

    /// Read `path` and validate it against the reference grid.
    pub fn read(&mut self, path: &Path) -> Result<BandGrid> {
        let grid = read_band_grid(path)?;
        self.check(path, &grid)?;
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_io_error() {
        let err = read_band_grid("/nonexistent/HLS.S30.T13RCN.B04.tif").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }

    #[test]
    fn aligner_rejects_mismatched_shape() {
        let mut aligner = GridAligner::new();
        let a = BandGrid::new(Array2::zeros((100, 100)), None);
        let b = BandGrid::new(Array2::zeros((100, 99)), None);
        aligner.check(Path::new("a.tif"), &a).unwrap();
        assert_eq!(aligner.reference().unwrap().shape(), (100, 100));
        let err = aligner.check(Path::new("b.tif"), &b).unwrap_err();
        assert!(matches!(err, Error::Alignment(_)));
    }
}
