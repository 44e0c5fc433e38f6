//! Instrument band registry: maps logical band names to the per-instrument
//! file name fragment used by HLS granules.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::granule::GranuleId;
use crate::types::{Band, Instrument};

/// File fragment of the Fmask quality layer, shared by both instruments.
pub const QUALITY_FRAGMENT: &str = "Fmask";

// HLS User Guide v2, Table 3/4.
const BAND_TABLE: &[(Instrument, Band, &str)] = &[
    (Instrument::L30, Band::Coastal, "B01"),
    (Instrument::L30, Band::Blue, "B02"),
    (Instrument::L30, Band::Green, "B03"),
    (Instrument::L30, Band::Red, "B04"),
    (Instrument::L30, Band::Nir, "B05"),
    (Instrument::L30, Band::Swir1, "B06"),
    (Instrument::L30, Band::Swir2, "B07"),
    (Instrument::L30, Band::Cirrus, "B09"),
    (Instrument::L30, Band::Thermal1, "B10"),
    (Instrument::L30, Band::Thermal2, "B11"),
    (Instrument::S30, Band::Coastal, "B01"),
    (Instrument::S30, Band::Blue, "B02"),
    (Instrument::S30, Band::Green, "B03"),
    (Instrument::S30, Band::Red, "B04"),
    (Instrument::S30, Band::RedEdge1, "B05"),
    (Instrument::S30, Band::RedEdge2, "B06"),
    (Instrument::S30, Band::RedEdge3, "B07"),
    (Instrument::S30, Band::NirBroad, "B08"),
    (Instrument::S30, Band::Nir, "B8A"),
    (Instrument::S30, Band::WaterVapor, "B09"),
    (Instrument::S30, Band::Cirrus, "B10"),
    (Instrument::S30, Band::Swir1, "B11"),
    (Instrument::S30, Band::Swir2, "B12"),
];

/// File name fragment for `band` on `instrument`.
pub fn file_band(instrument: Instrument, band: Band) -> Result<&'static str> {
    BAND_TABLE
        .iter()
        .find(|(i, b, _)| *i == instrument && *b == band)
        .map(|(_, _, fragment)| *fragment)
        .ok_or(Error::UnsupportedBand { instrument, band })
}

/// Logical bands available for `instrument`, in table order.
pub fn bands_for(instrument: Instrument) -> Vec<Band> {
    BAND_TABLE
        .iter()
        .filter(|(i, _, _)| *i == instrument)
        .map(|(_, b, _)| *b)
        .collect()
}

/// Resolve the input raster path of every requested band for one granule.
pub fn resolve_paths(
    dir: &Path,
    id: &GranuleId,
    bands: &[Band],
) -> Result<BTreeMap<Band, PathBuf>> {
    bands
        .iter()
        .map(|&band| {
            let fragment = file_band(id.instrument, band)?;
            let path = id.input_path(dir, fragment);
            debug!("Resolved {} ({}) -> {:?}", band, fragment, path);
            Ok((band, path))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nir_differs_between_instruments() {
        assert_eq!(file_band(Instrument::L30, Band::Nir).unwrap(), "B05");
        assert_eq!(file_band(Instrument::S30, Band::Nir).unwrap(), "B8A");
        assert_eq!(file_band(Instrument::S30, Band::Swir2).unwrap(), "B12");
    }

    #[test]
    fn reflectance_bands_defined_for_both_instruments() {
        for instrument in [Instrument::L30, Instrument::S30] {
            let available = bands_for(instrument);
            for band in Band::REFLECTANCE {
                assert!(available.contains(&band), "{instrument} lacks {band}");
            }
        }
    }

    #[test]
    fn instrument_specific_band_is_rejected() {
        let err = file_band(Instrument::L30, Band::RedEdge1).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedBand {
                instrument: Instrument::L30,
                band: Band::RedEdge1
            }
        ));
        assert!(matches!(
            file_band(Instrument::S30, Band::Thermal1),
            Err(Error::UnsupportedBand { .. })
        ));
        // Same fragment, different logical band per instrument.
        assert_eq!(file_band(Instrument::L30, Band::Thermal2).unwrap(), "B11");
        assert_eq!(file_band(Instrument::S30, Band::Swir1).unwrap(), "B11");
    }

    #[test]
    fn resolves_paths_for_granule() {
        let id: GranuleId = "HLS.L30.T06WVS.2024120T211159.v2.0".parse().unwrap();
        let paths = resolve_paths(Path::new("in"), &id, &[Band::Red, Band::Swir1]).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(
            paths[&Band::Swir1],
            PathBuf::from("in/HLS.L30.T06WVS.2024120T211159.v2.0.B06.tif")
        );
    }
}
