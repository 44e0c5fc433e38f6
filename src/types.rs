//! Shared types and enums used across HLS-VI.
//! Includes `Instrument`, the logical `Band` names, the closed set of
//! `VegetationIndex` products, and the GeoTIFF `Compression` profile.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// HLS product family a granule belongs to.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
pub enum Instrument {
    /// Landsat 8/9 OLI derived
    L30,
    /// Sentinel-2 MSI derived
    S30,
}

impl Instrument {
    pub fn name(&self) -> &'static str {
        match self {
            Instrument::L30 => "L30",
            Instrument::S30 => "S30",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "L30" => Some(Instrument::L30),
            "S30" => Some(Instrument::S30),
            _ => None,
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Instrument-independent spectral band name.
///
/// Some bands exist on a single instrument only (red edge and water vapour on
/// Sentinel-2, thermal on Landsat).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
pub enum Band {
    Coastal,
    Blue,
    Green,
    Red,
    RedEdge1,
    RedEdge2,
    RedEdge3,
    NirBroad,
    Nir,
    WaterVapor,
    Cirrus,
    Swir1,
    Swir2,
    Thermal1,
    Thermal2,
}

impl Band {
    /// Surface reflectance bands read for every granule.
    pub const REFLECTANCE: [Band; 6] = [
        Band::Blue,
        Band::Green,
        Band::Red,
        Band::Nir,
        Band::Swir1,
        Band::Swir2,
    ];
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Band::Coastal => "coastal",
            Band::Blue => "blue",
            Band::Green => "green",
            Band::Red => "red",
            Band::RedEdge1 => "red-edge1",
            Band::RedEdge2 => "red-edge2",
            Band::RedEdge3 => "red-edge3",
            Band::NirBroad => "nir-broad",
            Band::Nir => "nir",
            Band::WaterVapor => "water-vapor",
            Band::Cirrus => "cirrus",
            Band::Swir1 => "swir1",
            Band::Swir2 => "swir2",
            Band::Thermal1 => "thermal1",
            Band::Thermal2 => "thermal2",
        };
        write!(f, "{}", s)
    }
}

/// Vegetation index products. Formulas live in `core::indices`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
pub enum VegetationIndex {
    #[value(name = "ndvi")]
    NDVI,
    #[value(name = "evi")]
    EVI,
    #[value(name = "msavi")]
    MSAVI,
    #[value(name = "nbr")]
    NBR,
    #[value(name = "nbr2")]
    NBR2,
    #[value(name = "ndmi")]
    NDMI,
    #[value(name = "ndwi")]
    NDWI,
    #[value(name = "savi")]
    SAVI,
    #[value(name = "tvi")]
    TVI,
}

impl VegetationIndex {
    pub const ALL: [VegetationIndex; 9] = [
        VegetationIndex::EVI,
        VegetationIndex::MSAVI,
        VegetationIndex::NBR,
        VegetationIndex::NBR2,
        VegetationIndex::NDMI,
        VegetationIndex::NDVI,
        VegetationIndex::NDWI,
        VegetationIndex::SAVI,
        VegetationIndex::TVI,
    ];

    /// Short name used in file names and band descriptions.
    pub fn name(&self) -> &'static str {
        match self {
            VegetationIndex::NDVI => "NDVI",
            VegetationIndex::EVI => "EVI",
            VegetationIndex::MSAVI => "MSAVI",
            VegetationIndex::NBR => "NBR",
            VegetationIndex::NBR2 => "NBR2",
            VegetationIndex::NDMI => "NDMI",
            VegetationIndex::NDWI => "NDWI",
            VegetationIndex::SAVI => "SAVI",
            VegetationIndex::TVI => "TVI",
        }
    }

    pub fn long_name(&self) -> &'static str {
        match self {
            VegetationIndex::NDVI => "Normalized Difference Vegetation Index",
            VegetationIndex::EVI => "Enhanced Vegetation Index",
            VegetationIndex::MSAVI => "Modified Soil-Adjusted Vegetation Index",
            VegetationIndex::NBR => "Normalized Burn Ratio",
            VegetationIndex::NBR2 => "Normalized Burn Ratio 2",
            VegetationIndex::NDMI => "Normalized Difference Moisture Index",
            VegetationIndex::NDWI => "Normalized Difference Water Index",
            VegetationIndex::SAVI => "Soil-Adjusted Vegetation Index",
            VegetationIndex::TVI => "Triangular Vegetation Index",
        }
    }
}

impl std::fmt::Display for VegetationIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// GeoTIFF compression profile for written index rasters.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflate,
    Lzw,
    Zstd,
    #[value(name = "none")]
    #[serde(rename = "none")]
    Uncompressed,
}

impl Compression {
    /// Value for the GTiff `COMPRESS` creation option.
    pub fn gdal_name(&self) -> &'static str {
        match self {
            Compression::Deflate => "DEFLATE",
            Compression::Lzw => "LZW",
            Compression::Zstd => "ZSTD",
            Compression::Uncompressed => "NONE",
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.gdal_name())
    }
}
