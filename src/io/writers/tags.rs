//! Dataset tags written into every vegetation index GeoTIFF.
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::core::indices::FILL_VALUE;
use crate::error::Result;
use crate::granule::GranuleId;
use crate::types::VegetationIndex;

/// Tags carried over verbatim from the input bands when present.
pub const FIXED_TAGS: [&str; 17] = [
    "add_offset",
    "ACCODE",
    "AREA_OR_POINT",
    "cloud_coverage",
    "HORIZONTAL_CS_NAME",
    "MEAN_SUN_AZIMUTH_ANGLE",
    "MEAN_SUN_ZENITH_ANGLE",
    "MEAN_VIEW_AZIMUTH_ANGLE",
    "MEAN_VIEW_ZENITH_ANGLE",
    "NBAR_SOLAR_ZENITH",
    "NCOLS",
    "NROWS",
    "SENSING_TIME",
    "spatial_coverage",
    "SPATIAL_RESOLUTION",
    "ULX",
    "ULY",
];

pub const PROCESSING_TIME_TAG: &str = "HLS_VI_PROCESSING_TIME";
pub const SENSING_TIME_TAG: &str = "SENSING_TIME";

/// Timestamp format shared by the GeoTIFF tags and CMR metadata.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Granule-level tags shared by all index outputs of one run.
pub fn granule_tags(
    id: &GranuleId,
    source: &HashMap<String, String>,
) -> Result<BTreeMap<String, String>> {
    let mut tags: BTreeMap<String, String> = FIXED_TAGS
        .iter()
        .filter_map(|&key| source.get(key).map(|v| (key.to_string(), v.clone())))
        .collect();
    tags.insert("MGRS_TILE_ID".to_string(), id.tile_id.clone());
    tags.insert("SATELLITE".to_string(), id.satellite(source)?);
    Ok(tags)
}

/// Tags for a single index raster.
pub fn index_tags(
    granule: &BTreeMap<String, String>,
    index: VegetationIndex,
    processing_time: &str,
) -> BTreeMap<String, String> {
    let mut tags = granule.clone();
    tags.insert("long_name".to_string(), index.long_name().to_string());
    tags.insert("scale_factor".to_string(), index.scale_factor().to_string());
    tags.insert("_FillValue".to_string(), FILL_VALUE.to_string());
    tags.insert(PROCESSING_TIME_TAG.to_string(), processing_time.to_string());
    tags
}
