//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Every fatal condition of the pipeline maps to exactly one variant, and
//! [`Error::kind`] collapses them into the coarse categories callers branch on.
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{Band, Instrument, VegetationIndex};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Band {band} is not defined for instrument {instrument}")]
    UnsupportedBand { instrument: Instrument, band: Band },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GDAL error on {path:?}: {source}")]
    Gdal {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("Unexpected raster format in {path:?}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("Grid alignment mismatch: {0}")]
    Alignment(String),

    #[error("Index {index} requires band {band}, which was not provided")]
    MissingBand { index: VegetationIndex, band: Band },

    #[error("Invalid granule ID: {0}")]
    InvalidGranuleId(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedBand,
    Io,
    Format,
    Alignment,
    MissingBand,
    InvalidGranuleId,
    Metadata,
    Config,
    InvalidArgument,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedBand { .. } => ErrorKind::UnsupportedBand,
            Error::Io { .. } | Error::Gdal { .. } => ErrorKind::Io,
            Error::Format { .. } => ErrorKind::Format,
            Error::Alignment(_) => ErrorKind::Alignment,
            Error::MissingBand { .. } => ErrorKind::MissingBand,
            Error::InvalidGranuleId(_) => ErrorKind::InvalidGranuleId,
            Error::Metadata(_) | Error::Xml(_) => ErrorKind::Metadata,
            Error::Config(_) => ErrorKind::Config,
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn gdal<P: Into<PathBuf>>(path: P, source: gdal::errors::GdalError) -> Self {
        Error::Gdal {
            path: path.into(),
            source,
        }
    }
}
