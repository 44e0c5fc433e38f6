use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::mask::DEFAULT_QUALITY_BITS;
use crate::error::{Error, Result};
use crate::types::{Compression, VegetationIndex};

/// Processing parameters suitable for config files and CLI overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingParams {
    /// Indices to produce; duplicates are ignored
    pub indices: Vec<VegetationIndex>,
    /// Worker threads used to compute and write indices concurrently
    pub threads: usize,
    pub compression: Compression,
    /// Multiplier turning stored digital numbers into reflectance
    pub reflectance_scale: f64,
    /// Fmask bits that invalidate a pixel
    pub quality_mask_bits: u8,
    /// Copy the input `.jpg` browse image next to the outputs
    pub copy_thumbnail: bool,
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            indices: VegetationIndex::ALL.to_vec(),
            threads: default_threads(),
            compression: Compression::Deflate,
            reflectance_scale: 0.0001,
            quality_mask_bits: DEFAULT_QUALITY_BITS,
            copy_thumbnail: true,
        }
    }
}

impl ProcessingParams {
    /// Load parameters from a JSON file; absent fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let params: ProcessingParams = serde_json::from_str(&text)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.indices.is_empty() {
            return Err(Error::InvalidArgument {
                arg: "indices",
                value: "[]".into(),
            });
        }
        if self.threads == 0 {
            return Err(Error::InvalidArgument {
                arg: "threads",
                value: self.threads.to_string(),
            });
        }
        if !(self.reflectance_scale.is_finite() && self.reflectance_scale > 0.0) {
            return Err(Error::InvalidArgument {
                arg: "reflectance_scale",
                value: self.reflectance_scale.to_string(),
            });
        }
        Ok(())
    }

    /// Requested indices, sorted and deduplicated.
    pub fn requested_indices(&self) -> Vec<VegetationIndex> {
        let mut indices = self.indices.clone();
        indices.sort();
        indices.dedup();
        indices
    }
}
