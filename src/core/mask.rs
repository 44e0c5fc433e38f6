//! Invalid-pixel mask propagation.
//!
//! A mask is `true` where a pixel must not contribute to any index. It is built
//! from per-band fill values and then narrowed further by reflectance validity
//! and the Fmask quality layer.
use ndarray::{Array2, Zip};

use crate::core::grid::BandGrid;
use crate::error::{Error, Result};

/// Fmask bits treated as invalid by default: cloud (1), adjacent to
/// cloud/shadow (2) and cloud shadow (3). HLS User Guide v2, Table 9.
pub const DEFAULT_QUALITY_BITS: u8 = 0b0000_1110;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(Array2<bool>);

impl Mask {
    /// Mask with every pixel valid.
    pub fn clear(shape: (usize, usize)) -> Self {
        Mask(Array2::from_elem(shape, false))
    }

    pub fn from_array(invalid: Array2<bool>) -> Self {
        Mask(invalid)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.0.dim()
    }

    pub fn is_masked(&self, row: usize, col: usize) -> bool {
        self.0[[row, col]]
    }

    pub fn as_array(&self) -> &Array2<bool> {
        &self.0
    }

    /// Number of invalid pixels.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&m| m).count()
    }

    fn ensure_shape(&self, shape: (usize, usize), what: &str) -> Result<()> {
        if self.shape() != shape {
            return Err(Error::Alignment(format!(
                "{} has shape {:?}, mask has {:?}",
                what,
                shape,
                self.shape()
            )));
        }
        Ok(())
    }

    /// Position-wise OR with another mask.
    pub fn union(&mut self, other: &Mask) -> Result<()> {
        self.ensure_shape(other.shape(), "mask")?;
        Zip::from(&mut self.0)
            .and(&other.0)
            .for_each(|m, &o| *m |= o);
        Ok(())
    }

    /// Mask pixels with non-positive reflectance. Values above 100% stay valid.
    pub fn mask_nonpositive(&mut self, grid: &BandGrid) -> Result<()> {
        self.ensure_shape(grid.shape(), "band")?;
        Zip::from(&mut self.0)
            .and(&grid.data)
            .for_each(|m, &v| *m |= !grid.is_fill(v) && v <= 0.0);
        Ok(())
    }

    /// Mask pixels whose quality value has any of `bits` set.
    ///
    /// Quality fill pixels are masked too.
    pub fn mask_quality_bits(&mut self, quality: &BandGrid, bits: u8) -> Result<()> {
        self.ensure_shape(quality.shape(), "quality layer")?;
        Zip::from(&mut self.0).and(&quality.data).for_each(|m, &q| {
            *m |= quality.is_fill(q) || (q as i64) & i64::from(bits) != 0;
        });
        Ok(())
    }
}

/// Combined fill mask: a pixel is invalid if it equals the fill value of ANY grid.
///
/// All grids must share one shape; a mismatch is an `Alignment` error.
pub fn build_mask(grids: &[&BandGrid]) -> Result<Mask> {
    let first = grids
        .first()
        .ok_or_else(|| Error::Alignment("no grids to build a mask from".into()))?;
    let mut mask = Mask::clear(first.shape());

    for grid in grids {
        mask.ensure_shape(grid.shape(), "band")?;
        if grid.fill_value.is_none() {
            continue;
        }
        Zip::from(&mut mask.0)
            .and(&grid.data)
            .for_each(|m, &v| *m |= grid.is_fill(v));
    }
    Ok(mask)
}
