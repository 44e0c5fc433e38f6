//! Granule identifiers and the file naming conventions derived from them.
//!
//! HLS granule IDs look like `HLS.L30.T06WVS.2024120T211159.v2.0`, where the
//! trailing version may itself contain dots. Vegetation index products reuse the
//! same fields with an `HLS-VI` prefix.
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::{Instrument, VegetationIndex};

pub const INPUT_PREFIX: &str = "HLS";
pub const OUTPUT_PREFIX: &str = "HLS-VI";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GranuleId {
    pub instrument: Instrument,
    pub tile_id: String,
    pub acquisition_date: String,
    pub version: String,
}

impl FromStr for GranuleId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidGranuleId(s.to_string());
        let mut parts = s.splitn(5, '.');

        if parts.next() != Some(INPUT_PREFIX) {
            return Err(invalid());
        }
        let instrument = parts
            .next()
            .and_then(Instrument::from_name)
            .ok_or_else(invalid)?;
        let mut field = || {
            parts
                .next()
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .ok_or_else(invalid)
        };
        let tile_id = field()?;
        let acquisition_date = field()?;
        let version = field()?;

        Ok(GranuleId {
            instrument,
            tile_id,
            acquisition_date,
            version,
        })
    }
}

impl fmt::Display for GranuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", INPUT_PREFIX, self.body())
    }
}

impl GranuleId {
    fn body(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.instrument, self.tile_id, self.acquisition_date, self.version
        )
    }

    /// ID of the derived vegetation index granule (`HLS-VI.…`).
    pub fn output_id(&self) -> String {
        format!("{}.{}", OUTPUT_PREFIX, self.body())
    }

    /// Path of the input raster for an instrument band file fragment (`B04`, `Fmask`, …).
    pub fn input_path(&self, dir: &Path, fragment: &str) -> PathBuf {
        dir.join(format!("{}.{}.tif", self, fragment))
    }

    /// Path of the output raster for one vegetation index.
    pub fn index_path(&self, dir: &Path, index: VegetationIndex) -> PathBuf {
        dir.join(format!("{}.{}.tif", self.output_id(), index))
    }

    pub fn thumbnail_paths(&self, input_dir: &Path, output_dir: &Path) -> (PathBuf, PathBuf) {
        (
            input_dir.join(format!("{}.jpg", self)),
            output_dir.join(format!("{}.jpg", self.output_id())),
        )
    }

    /// Satellite name as recorded in the VI tags, derived from the input band tags.
    ///
    /// L30: `LANDSAT_PRODUCT_ID` like `LC08_L1TP_…` gives `L8`.
    /// S30: `PRODUCT_URI` like `S2B_MSIL1C_…` gives `S2B`; an absent tag gives `""`.
    pub fn satellite(&self, tags: &HashMap<String, String>) -> Result<String> {
        match self.instrument {
            Instrument::L30 => {
                let product_id = tags.get("LANDSAT_PRODUCT_ID").ok_or_else(|| {
                    Error::Metadata("LANDSAT_PRODUCT_ID tag missing from input band".into())
                })?;
                let number: u32 = product_id
                    .get(2..4)
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(|| {
                        Error::Metadata(format!("Unparseable LANDSAT_PRODUCT_ID: {}", product_id))
                    })?;
                Ok(format!("L{}", number))
            }
            Instrument::S30 => {
                let uri = tags.get("PRODUCT_URI").map(String::as_str).unwrap_or_default();
                Ok(uri.split('_').next().unwrap_or_default().to_string())
            }
        }
    }
}

/// Replace the leading `HLS` product prefix with `HLS-VI`.
///
/// Only the first occurrence is replaced, so strings that already carry the
/// output prefix are returned unchanged.
pub fn swap_prefix(s: &str) -> String {
    if s.contains(OUTPUT_PREFIX) {
        return s.to_string();
    }
    s.replacen(INPUT_PREFIX, OUTPUT_PREFIX, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_landsat_id() {
        let id: GranuleId = "HLS.L30.T06WVS.2024120T211159.v2.0".parse().unwrap();
        assert_eq!(id.instrument, Instrument::L30);
        assert_eq!(id.tile_id, "T06WVS");
        assert_eq!(id.acquisition_date, "2024120T211159");
        assert_eq!(id.version, "v2.0");
        assert_eq!(id.to_string(), "HLS.L30.T06WVS.2024120T211159.v2.0");
        assert_eq!(id.output_id(), "HLS-VI.L30.T06WVS.2024120T211159.v2.0");
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in [
            "",
            "HLS.X30.T06WVS.2024120T211159.v2.0",
            "HLS.S30.T13RCN",
            "HLS-VI.S30.T13RCN.2024128T173909.v2.0",
            "HLS.S30..2024128T173909.v2.0",
        ] {
            let err = bad.parse::<GranuleId>().unwrap_err();
            assert!(matches!(err, Error::InvalidGranuleId(_)), "{bad}");
        }
    }

    #[test]
    fn builds_file_names() {
        let id: GranuleId = "HLS.S30.T13RCN.2024128T173909.v2.0".parse().unwrap();
        let dir = Path::new("/data");
        assert_eq!(
            id.input_path(dir, "B8A"),
            PathBuf::from("/data/HLS.S30.T13RCN.2024128T173909.v2.0.B8A.tif")
        );
        assert_eq!(
            id.index_path(dir, VegetationIndex::NBR2),
            PathBuf::from("/data/HLS-VI.S30.T13RCN.2024128T173909.v2.0.NBR2.tif")
        );
    }

    #[test]
    fn satellite_from_tags() {
        let l30: GranuleId = "HLS.L30.T06WVS.2024120T211159.v2.0".parse().unwrap();
        let s30: GranuleId = "HLS.S30.T13RCN.2024128T173909.v2.0".parse().unwrap();
        let mut tags = HashMap::new();
        tags.insert(
            "LANDSAT_PRODUCT_ID".to_string(),
            "LC08_L1TP_069014_20240429_20240430_02_RT".to_string(),
        );
        tags.insert(
            "PRODUCT_URI".to_string(),
            "S2B_MSIL1C_20240507T173909_N0510_R098_T13RCN_20240507T211610.SAFE".to_string(),
        );
        assert_eq!(l30.satellite(&tags).unwrap(), "L8");
        assert_eq!(s30.satellite(&tags).unwrap(), "S2B");
        assert!(l30.satellite(&HashMap::new()).is_err());
    }

    #[test]
    fn sentinel_without_product_uri_has_empty_satellite() {
        let s30: GranuleId = "HLS.S30.T13RCN.2024128T173909.v2.0".parse().unwrap();
        assert_eq!(s30.satellite(&HashMap::new()).unwrap(), "");
    }

    #[test]
    fn swaps_prefix_once() {
        assert_eq!(
            swap_prefix("HLS.L30.T06WVS.2024120T211159.v2.0"),
            "HLS-VI.L30.T06WVS.2024120T211159.v2.0"
        );
        assert_eq!(swap_prefix("HLS-VI.L30.x"), "HLS-VI.L30.x");
    }
}
