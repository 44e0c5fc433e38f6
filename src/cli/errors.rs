use std::path::PathBuf;

use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Cannot infer a granule ID from {path:?}; pass --id-string")]
    UnknownGranuleId { path: PathBuf },

    #[error("--id-string cannot be combined with --batch")]
    IdStringInBatch,

    #[error("Batch finished with {errors} failed granule(s) ({processed} processed)")]
    BatchFailures { processed: usize, errors: usize },

    #[error(transparent)]
    Hlsvi(#[from] hlsvi::Error),
}
