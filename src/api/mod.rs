//! High-level library API: read a granule, compute indices in memory, process a
//! granule directory to tagged GeoTIFFs, and batch helpers for directories of
//! granules. Prefer these entrypoints over the low-level `core` modules.
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::core::grid::{BandGrid, GridGeometry};
use crate::core::indices::{self, OutputRaster};
use crate::core::mask::{Mask, build_mask};
use crate::core::params::ProcessingParams;
use crate::core::registry::{QUALITY_FRAGMENT, resolve_paths};
use crate::error::{Error, Result};
use crate::granule::GranuleId;
use crate::io::gdal::GridAligner;
use crate::io::writers::tags::{format_timestamp, granule_tags, index_tags};
use crate::io::writers::write_index_tiff;
use crate::types::{Band, Instrument, VegetationIndex};

pub use crate::io::cmr::generate_metadata;
pub use crate::io::stac::generate_stac_item;

/// Reflectance grids of one granule plus the combined invalid-pixel mask.
#[derive(Debug, Clone)]
pub struct GranuleBands {
    pub instrument: Instrument,
    pub bands: BTreeMap<Band, BandGrid>,
    pub mask: Mask,
}

/// A granule read from disk: its bands, the shared grid and the source tags.
#[derive(Debug, Clone)]
pub struct Granule {
    pub id: GranuleId,
    pub inputs: GranuleBands,
    pub geometry: GridGeometry,
    /// Dataset tags of the first reflectance band
    pub tags: HashMap<String, String>,
}

/// Outcome of processing a single granule
#[derive(Debug, Clone)]
pub struct GranuleReport {
    pub output_id: String,
    pub outputs: Vec<PathBuf>,
    pub thumbnail: Option<PathBuf>,
    pub masked_pixels: usize,
    pub processing_time: String,
}

/// Batch processing report
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

fn thread_pool(threads: usize) -> Result<rayon::ThreadPool> {
    if threads == 0 {
        return Err(Error::InvalidArgument {
            arg: "threads",
            value: threads.to_string(),
        });
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::InvalidArgument {
            arg: "threads",
            value: format!("{} ({})", threads, e),
        })
}

/// Read the six reflectance bands and the Fmask layer of a granule.
///
/// Every raster must share the first band's shape and geotransform. The mask
/// flags pixels that are fill in any band, non-positive in any band after
/// scaling, or have any of `params.quality_mask_bits` set in Fmask.
pub fn read_granule(input_dir: &Path, id: &GranuleId, params: &ProcessingParams) -> Result<Granule> {
    let paths = resolve_paths(input_dir, id, &Band::REFLECTANCE)?;
    let mut aligner = GridAligner::new();

    let mut raw = BTreeMap::new();
    for (band, path) in &paths {
        raw.insert(*band, aligner.read(path)?);
    }
    let quality = aligner.read(&id.input_path(input_dir, QUALITY_FRAGMENT))?;

    let geometry = aligner
        .reference()
        .cloned()
        .ok_or_else(|| Error::Alignment(format!("no rasters read for {}", id)))?;
    let tags = raw
        .get(&Band::Blue)
        .map(|grid| grid.tags.clone())
        .unwrap_or_default();

    let mut mask = build_mask(&raw.values().collect::<Vec<_>>())?;
    let bands: BTreeMap<Band, BandGrid> = raw
        .into_iter()
        .map(|(band, grid)| (band, grid.to_reflectance(params.reflectance_scale)))
        .collect();
    for grid in bands.values() {
        mask.mask_nonpositive(grid)?;
    }
    mask.mask_quality_bits(&quality, params.quality_mask_bits)?;

    debug!(
        "{}: {}x{} grid, {} of {} pixels masked",
        id,
        geometry.width,
        geometry.height,
        mask.count(),
        geometry.width * geometry.height
    );

    Ok(Granule {
        id: id.clone(),
        inputs: GranuleBands {
            instrument: id.instrument,
            bands,
            mask,
        },
        geometry,
        tags,
    })
}

/// Compute `requested` indices in memory on a pool of `threads` workers.
pub fn compute_indices(
    inputs: &GranuleBands,
    requested: &[VegetationIndex],
    threads: usize,
) -> Result<BTreeMap<VegetationIndex, OutputRaster>> {
    let pool = thread_pool(threads)?;
    debug!(
        "Computing {} indices for {} on {} threads",
        requested.len(),
        inputs.instrument,
        threads
    );
    pool.install(|| {
        requested
            .par_iter()
            .map(|&index| indices::compute(index, &inputs.bands, &inputs.mask).map(|r| (index, r)))
            .collect()
    })
}

/// Process one granule directory into `output_dir`.
///
/// Writes one GeoTIFF per requested index and, when configured, copies the
/// browse image. Any failing index fails the whole granule.
pub fn process_granule(
    input_dir: &Path,
    output_dir: &Path,
    granule_id: &str,
    params: &ProcessingParams,
) -> Result<GranuleReport> {
    params.validate()?;
    let id: GranuleId = granule_id.parse()?;
    std::fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;

    info!("Processing {} from {:?}", id, input_dir);
    let granule = read_granule(input_dir, &id, params)?;
    let shared_tags = granule_tags(&id, &granule.tags)?;
    let processing_time = format_timestamp(Utc::now());

    let requested = params.requested_indices();
    let pool = thread_pool(params.threads)?;
    let outputs = pool.install(|| {
        requested
            .par_iter()
            .map(|&index| -> Result<PathBuf> {
                let raster = indices::compute(index, &granule.inputs.bands, &granule.inputs.mask)?;
                let path = id.index_path(output_dir, index);
                let tags = index_tags(&shared_tags, index, &processing_time);
                write_index_tiff(&path, &raster, &granule.geometry, &tags, params.compression)?;
                debug!("{}: {} valid pixels", index, raster.valid_count());
                Ok(path)
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let thumbnail = if params.copy_thumbnail {
        copy_thumbnail(&id, input_dir, output_dir)?
    } else {
        None
    };

    info!(
        "Wrote {} indices for {} to {:?}",
        outputs.len(),
        id.output_id(),
        output_dir
    );

    Ok(GranuleReport {
        output_id: id.output_id(),
        outputs,
        thumbnail,
        masked_pixels: granule.inputs.mask.count(),
        processing_time,
    })
}

fn copy_thumbnail(id: &GranuleId, input_dir: &Path, output_dir: &Path) -> Result<Option<PathBuf>> {
    let (source, target) = id.thumbnail_paths(input_dir, output_dir);
    if !source.is_file() {
        warn!("No browse image at {:?}; skipping thumbnail", source);
        return Ok(None);
    }
    std::fs::copy(&source, &target).map_err(|e| Error::io(&source, e))?;
    Ok(Some(target))
}

/// Return the immediate subdirectories of `input_root`, sorted by name (candidate granules)
pub fn iterate_granule_dirs(input_root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(input_root).map_err(|e| Error::io(input_root, e))? {
        let entry = entry.map_err(|e| Error::io(input_root, e))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Process every granule subdirectory of `input_root` into
/// `output_root/HLS-VI.…` directories.
///
/// Directories whose name is not a granule ID are skipped. If `continue_on_error`
/// is true, failures are counted in the report and processing continues;
/// otherwise the first error is returned.
pub fn process_directory(
    input_root: &Path,
    output_root: &Path,
    params: &ProcessingParams,
    continue_on_error: bool,
) -> Result<BatchReport> {
    params.validate()?;
    std::fs::create_dir_all(output_root).map_err(|e| Error::io(output_root, e))?;

    let mut report = BatchReport::default();
    for dir in iterate_granule_dirs(input_root)? {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id: GranuleId = match name.parse() {
            Ok(id) => id,
            Err(_) => {
                warn!("Skipping {:?}: not a granule directory", dir);
                report.skipped += 1;
                continue;
            }
        };

        let output_dir = output_root.join(id.output_id());
        match process_granule(&dir, &output_dir, &name, params) {
            Ok(_) => report.processed += 1,
            Err(e) => {
                warn!("{} failed: {}", id, e);
                report.errors += 1;
                if !continue_on_error {
                    return Err(e);
                }
            }
        }
    }

    info!(
        "Batch complete: {} processed, {} skipped, {} errors",
        report.processed, report.skipped, report.errors
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use ndarray::array;

    fn inputs(red: f64, nir: f64) -> GranuleBands {
        let bands = Band::REFLECTANCE
            .iter()
            .map(|&b| {
                let v = match b {
                    Band::Red => red,
                    Band::Nir => nir,
                    _ => 0.1,
                };
                (b, BandGrid::new(array![[v, v]], Some(-9999.0)))
            })
            .collect();
        GranuleBands {
            instrument: Instrument::S30,
            bands,
            mask: Mask::from_array(array![[false, true]]),
        }
    }

    #[test]
    fn computes_requested_indices_only() {
        let out = compute_indices(
            &inputs(0.2, 0.5),
            &[VegetationIndex::NDVI, VegetationIndex::NBR],
            2,
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        let ndvi = &out[&VegetationIndex::NDVI];
        approx::assert_abs_diff_eq!(ndvi.value(0, 0).unwrap(), 0.428_571, epsilon = 1e-4);
        assert_eq!(ndvi.value(0, 1), None);
    }

    #[test]
    fn zero_threads_rejected() {
        let err = compute_indices(&inputs(0.2, 0.5), &[VegetationIndex::NDVI], 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn missing_band_reported() {
        let mut granule = inputs(0.2, 0.5);
        granule.bands.remove(&Band::Swir2);
        let err = compute_indices(&granule, &VegetationIndex::ALL, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingBand {
                band: Band::Swir2,
                ..
            }
        ));
    }

    #[test]
    fn batch_skips_non_granule_dirs() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::create_dir(input.path().join("not-a-granule")).unwrap();
        let report =
            process_directory(input.path(), output.path(), &ProcessingParams::default(), true)
                .unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors, 0);
    }
}
