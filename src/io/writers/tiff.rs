use std::collections::BTreeMap;
use std::path::Path;

use gdal::raster::{Buffer, RasterCreationOptions};
use gdal::{DriverManager, Metadata};
use tracing::debug;

use crate::core::grid::GridGeometry;
use crate::core::indices::OutputRaster;
use crate::error::{Error, Result};
use crate::types::Compression;

fn creation_options(compression: Compression) -> gdal::errors::Result<RasterCreationOptions> {
    let mut options = RasterCreationOptions::new();
    options.set_name_value("COMPRESS", compression.gdal_name())?;
    if compression != Compression::Uncompressed {
        options.set_name_value("PREDICTOR", "2")?;
    }
    Ok(options)
}

/// Write an encoded index raster as a single-band Int16 GeoTIFF.
///
/// Georeferencing comes from `template`; nodata, scale and offset are set on the
/// band and `tags` become dataset metadata.
pub fn write_index_tiff(
    output: &Path,
    raster: &OutputRaster,
    template: &GridGeometry,
    tags: &BTreeMap<String, String>,
    compression: Compression,
) -> Result<()> {
    let gdal_err = |e: gdal::errors::GdalError| Error::gdal(output, e);
    let (rows, cols) = raster.shape();
    if template.shape() != (rows, cols) {
        return Err(Error::Alignment(format!(
            "{} raster is {}x{}, template grid is {}x{}",
            raster.index, rows, cols, template.height, template.width
        )));
    }

    let driver = DriverManager::get_driver_by_name("GTiff").map_err(gdal_err)?;
    let options = creation_options(compression).map_err(gdal_err)?;
    let mut ds = driver
        .create_with_band_type_with_options::<i16, _>(output, cols, rows, 1, &options)
        .map_err(gdal_err)?;

    ds.set_geo_transform(&template.geotransform)
        .map_err(gdal_err)?;
    if !template.projection.is_empty() {
        ds.set_projection(&template.projection).map_err(gdal_err)?;
    }

    {
        let mut band = ds.rasterband(1).map_err(gdal_err)?;
        band.set_no_data_value(Some(f64::from(raster.fill_value())))
            .map_err(gdal_err)?;
        band.set_scale(raster.scale_factor()).map_err(gdal_err)?;
        band.set_offset(0.0).map_err(gdal_err)?;
        band.set_description(raster.index.name()).map_err(gdal_err)?;

        let data: Vec<i16> = raster.encode().iter().copied().collect();
        let mut buf = Buffer::new((cols, rows), data);
        band.write((0, 0), (cols, rows), &mut buf).map_err(gdal_err)?;
    }

    for (key, value) in tags {
        ds.set_metadata_item(key, value, "").map_err(gdal_err)?;
    }

    debug!("Wrote {} to {:?} ({})", raster.index, output, compression);
    Ok(())
}
