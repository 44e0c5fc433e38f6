//! Vegetation index formulas and their integer encoding.
//!
//! Every index is a pure per-pixel function of surface reflectance. Degenerate
//! arithmetic (zero denominators, negative square-root radicands, non-finite
//! inputs) never escapes as NaN or infinity: such pixels are filled instead.
//!
//! | Index | Formula                                              | Scale  |
//! |-------|------------------------------------------------------|--------|
//! | NDVI  | (nir − red) / (nir + red)                            | 0.0001 |
//! | EVI   | 2.5 (nir − red) / (nir + 6 red − 7.5 blue + 1)       | 0.0001 |
//! | SAVI  | 1.5 (nir − red) / (nir + red + 0.5)                  | 0.0001 |
//! | MSAVI | ½ (2 nir + 1 − √((2 nir + 1)² − 8 (nir − red)))      | 0.0001 |
//! | NBR   | (nir − swir2) / (nir + swir2)                        | 0.0001 |
//! | NBR2  | (swir1 − swir2) / (swir1 + swir2)                    | 0.0001 |
//! | NDMI  | (nir − swir1) / (nir + swir1)                        | 0.0001 |
//! | NDWI  | (green − nir) / (green + nir)                        | 0.0001 |
//! | TVI   | ½ (120 (nir − green) − 200 (red − green))            | 0.01   |
use std::collections::BTreeMap;

use ndarray::{Array2, Zip};

use crate::core::grid::BandGrid;
use crate::core::mask::Mask;
use crate::error::{Error, Result};
use crate::types::{Band, VegetationIndex};

/// Fill value of every encoded index raster.
pub const FILL_VALUE: i16 = -19_999;

/// Reflectance of one pixel across the bands an index may use.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    pub blue: f64,
    pub green: f64,
    pub red: f64,
    pub nir: f64,
    pub swir1: f64,
    pub swir2: f64,
}

impl Sample {
    /// Field holding `band`, or `None` for bands no formula reads.
    fn slot(&mut self, band: Band) -> Option<&mut f64> {
        match band {
            Band::Blue => Some(&mut self.blue),
            Band::Green => Some(&mut self.green),
            Band::Red => Some(&mut self.red),
            Band::Nir => Some(&mut self.nir),
            Band::Swir1 => Some(&mut self.swir1),
            Band::Swir2 => Some(&mut self.swir2),
            Band::Coastal
            | Band::RedEdge1
            | Band::RedEdge2
            | Band::RedEdge3
            | Band::NirBroad
            | Band::WaterVapor
            | Band::Cirrus
            | Band::Thermal1
            | Band::Thermal2 => None,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

fn normalized_difference(a: f64, b: f64) -> Option<f64> {
    ratio(a - b, a + b)
}

impl VegetationIndex {
    /// Bands the formula reads.
    pub fn required_bands(&self) -> &'static [Band] {
        match self {
            VegetationIndex::NDVI | VegetationIndex::SAVI | VegetationIndex::MSAVI => {
                &[Band::Red, Band::Nir]
            }
            VegetationIndex::EVI => &[Band::Blue, Band::Red, Band::Nir],
            VegetationIndex::NBR => &[Band::Nir, Band::Swir2],
            VegetationIndex::NBR2 => &[Band::Swir1, Band::Swir2],
            VegetationIndex::NDMI => &[Band::Nir, Band::Swir1],
            VegetationIndex::NDWI => &[Band::Green, Band::Nir],
            VegetationIndex::TVI => &[Band::Green, Band::Red, Band::Nir],
        }
    }

    /// Multiplier converting encoded integers back to index values.
    pub fn scale_factor(&self) -> f64 {
        match self {
            VegetationIndex::TVI => 0.01,
            _ => 0.0001,
        }
    }

    /// Evaluate the formula for one pixel. `None` means the pixel is filled.
    pub fn evaluate(&self, s: &Sample) -> Option<f64> {
        let value = match self {
            VegetationIndex::NDVI => normalized_difference(s.nir, s.red),
            VegetationIndex::EVI => ratio(
                2.5 * (s.nir - s.red),
                s.nir + 6.0 * s.red - 7.5 * s.blue + 1.0,
            ),
            VegetationIndex::SAVI => ratio(1.5 * (s.nir - s.red), s.nir + s.red + 0.5),
            VegetationIndex::MSAVI => {
                let a = 2.0 * s.nir + 1.0;
                let radicand = a * a - 8.0 * (s.nir - s.red);
                if radicand < 0.0 {
                    None
                } else {
                    Some(0.5 * (a - radicand.sqrt()))
                }
            }
            VegetationIndex::NBR => normalized_difference(s.nir, s.swir2),
            VegetationIndex::NBR2 => normalized_difference(s.swir1, s.swir2),
            VegetationIndex::NDMI => normalized_difference(s.nir, s.swir1),
            VegetationIndex::NDWI => normalized_difference(s.green, s.nir),
            VegetationIndex::TVI => {
                Some(0.5 * (120.0 * (s.nir - s.green) - 200.0 * (s.red - s.green)))
            }
        };
        value.filter(|v| v.is_finite())
    }
}

/// Computed index values for one granule.
#[derive(Debug, Clone)]
pub struct OutputRaster {
    pub index: VegetationIndex,
    /// Index values; filled pixels hold exactly `FILL_VALUE`
    pub values: Array2<f64>,
    /// Pixels carrying the fill value
    pub filled: Mask,
}

impl OutputRaster {
    pub fn fill_value(&self) -> i16 {
        FILL_VALUE
    }

    pub fn scale_factor(&self) -> f64 {
        self.index.scale_factor()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        if self.filled.is_masked(row, col) {
            None
        } else {
            Some(self.values[[row, col]])
        }
    }

    pub fn valid_count(&self) -> usize {
        self.values.len() - self.filled.count()
    }

    /// Int16 encoding written to disk.
    pub fn encode(&self) -> Array2<i16> {
        let scale = self.scale_factor();
        let mut out = Array2::from_elem(self.shape(), FILL_VALUE);
        Zip::from(&mut out)
            .and(&self.values)
            .and(self.filled.as_array())
            .for_each(|o, &v, &filled| {
                if !filled {
                    *o = encode_value(v, scale);
                }
            });
        out
    }
}

/// Scale, round half to even, and saturate to Int16. A valid value never
/// encodes to `FILL_VALUE`; it is moved one step up instead.
pub fn encode_value(value: f64, scale_factor: f64) -> i16 {
    let scaled = (value / scale_factor).round_ties_even();
    let encoded = scaled.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
    if encoded == FILL_VALUE {
        FILL_VALUE + 1
    } else {
        encoded
    }
}

/// Compute one index over aligned reflectance grids.
///
/// Pixels flagged in `mask`, pixels equal to a contributing band's fill value,
/// and pixels where the formula is undefined are set to `FILL_VALUE`.
pub fn compute(
    index: VegetationIndex,
    bands: &BTreeMap<Band, BandGrid>,
    mask: &Mask,
) -> Result<OutputRaster> {
    let grids = bind_grids(index, index.required_bands(), bands, mask.shape())?;
    let shape = mask.shape();

    let mut values = Array2::from_elem(shape, f64::from(FILL_VALUE));
    let mut filled = Array2::from_elem(shape, true);

    Zip::indexed(&mut values)
        .and(&mut filled)
        .for_each(|(row, col), value, fill| {
            if mask.is_masked(row, col) {
                return;
            }
            let mut sample = Sample::default();
            for (band, grid) in &grids {
                let v = grid.data[[row, col]];
                if grid.is_fill(v) {
                    return;
                }
                if let Some(slot) = sample.slot(*band) {
                    *slot = v;
                }
            }
            if let Some(result) = index.evaluate(&sample) {
                *value = result;
                *fill = false;
            }
        });

    Ok(OutputRaster {
        index,
        values,
        filled: Mask::from_array(filled),
    })
}

/// Look up the grids of `required` and check them against the mask shape.
///
/// A band without a [`Sample`] field cannot feed a formula and is reported as
/// missing, like a band absent from `bands`.
fn bind_grids<'a>(
    index: VegetationIndex,
    required: &[Band],
    bands: &'a BTreeMap<Band, BandGrid>,
    shape: (usize, usize),
) -> Result<Vec<(Band, &'a BandGrid)>> {
    required
        .iter()
        .map(|&band| {
            if Sample::default().slot(band).is_none() {
                return Err(Error::MissingBand { index, band });
            }
            let grid = bands.get(&band).ok_or(Error::MissingBand { index, band })?;
            if grid.shape() != shape {
                return Err(Error::Alignment(format!(
                    "{} band has shape {:?}, mask has {:?}",
                    band,
                    grid.shape(),
                    shape
                )));
            }
            Ok((band, grid))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn single(values: &[(Band, f64)]) -> BTreeMap<Band, BandGrid> {
        values
            .iter()
            .map(|&(b, v)| (b, BandGrid::new(array![[v]], Some(-9999.0))))
            .collect()
    }

    fn typical() -> Sample {
        Sample {
            blue: 0.05,
            green: 0.08,
            red: 0.06,
            nir: 0.4,
            swir1: 0.2,
            swir2: 0.1,
        }
    }

    #[test]
    fn ndvi_single_pixel() {
        let bands = single(&[(Band::Red, 0.2), (Band::Nir, 0.5)]);
        let out = compute(VegetationIndex::NDVI, &bands, &Mask::clear((1, 1))).unwrap();
        assert_abs_diff_eq!(out.value(0, 0).unwrap(), 0.4286, epsilon = 1e-4);
        assert_eq!(out.encode()[[0, 0]], 4286);
    }

    #[test]
    fn nbr2_equal_nonzero_bands_is_zero() {
        let bands = single(&[(Band::Swir1, 0.3), (Band::Swir2, 0.3)]);
        let out = compute(VegetationIndex::NBR2, &bands, &Mask::clear((1, 1))).unwrap();
        assert_eq!(out.value(0, 0), Some(0.0));
        assert_eq!(out.encode()[[0, 0]], 0);
    }

    #[test]
    fn ndvi_zero_sum_is_filled() {
        let bands = single(&[(Band::Red, 0.0), (Band::Nir, 0.0)]);
        let out = compute(VegetationIndex::NDVI, &bands, &Mask::clear((1, 1))).unwrap();
        assert_eq!(out.value(0, 0), None);
        assert_eq!(out.values[[0, 0]], f64::from(FILL_VALUE));
        assert_eq!(out.encode()[[0, 0]], FILL_VALUE);
    }

    #[test]
    fn formulas_on_typical_pixel() {
        let s = typical();
        let expect = [
            (VegetationIndex::NDVI, 0.34 / 0.46),
            (VegetationIndex::EVI, 0.85 / 1.385),
            (VegetationIndex::SAVI, 0.53125),
            (VegetationIndex::MSAVI, 0.5 * (1.8 - 0.52f64.sqrt())),
            (VegetationIndex::NBR, 0.6),
            (VegetationIndex::NBR2, 1.0 / 3.0),
            (VegetationIndex::NDMI, 1.0 / 3.0),
            (VegetationIndex::NDWI, -0.32 / 0.48),
            (VegetationIndex::TVI, 21.2),
        ];
        for (index, expected) in expect {
            let got = index.evaluate(&s).unwrap();
            assert_abs_diff_eq!(got, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn degenerate_arithmetic_is_filled() {
        // EVI denominator: 0.875 + 0 - 1.875 + 1 == 0
        let evi = Sample {
            blue: 0.25,
            nir: 0.875,
            ..Sample::default()
        };
        assert_eq!(VegetationIndex::EVI.evaluate(&evi), None);

        // MSAVI radicand: (2*0.5 + 1)^2 - 8*(0.5 + 0.5) = -4
        let msavi = Sample {
            nir: 0.5,
            red: -0.5,
            ..Sample::default()
        };
        assert_eq!(VegetationIndex::MSAVI.evaluate(&msavi), None);

        // SAVI denominator: 0.25 + 0.25 + 0.5 == 0 only for negative reflectance
        let savi = Sample {
            nir: -0.25,
            red: -0.25,
            ..Sample::default()
        };
        assert_eq!(VegetationIndex::SAVI.evaluate(&savi), None);

        let nan = Sample {
            nir: f64::NAN,
            ..typical()
        };
        for index in VegetationIndex::ALL {
            if index.required_bands().contains(&Band::Nir) {
                assert_eq!(index.evaluate(&nan), None, "{index}");
            }
        }
    }

    #[test]
    fn masked_pixels_filled_in_every_dependent_index() {
        let mut bands = BTreeMap::new();
        let s = typical();
        for (band, v) in [
            (Band::Blue, s.blue),
            (Band::Green, s.green),
            (Band::Red, s.red),
            (Band::Nir, s.nir),
            (Band::Swir1, s.swir1),
            (Band::Swir2, s.swir2),
        ] {
            bands.insert(band, BandGrid::new(Array2::from_elem((2, 3), v), Some(-9999.0)));
        }
        let mask = Mask::from_array(array![[true, false, false], [false, false, true]]);

        for index in VegetationIndex::ALL {
            let out = compute(index, &bands, &mask).unwrap();
            let encoded = out.encode();
            assert_eq!(out.value(0, 0), None, "{index}");
            assert_eq!(out.value(1, 2), None, "{index}");
            assert_eq!(encoded[[0, 0]], FILL_VALUE);
            assert_eq!(encoded[[1, 2]], FILL_VALUE);
            assert!(out.value(0, 1).is_some(), "{index}");
            assert_eq!(out.valid_count(), 4);
        }
    }

    #[test]
    fn band_fill_value_propagates_without_mask() {
        let mut bands = single(&[(Band::Red, 0.2), (Band::Nir, 0.5)]);
        bands.insert(Band::Red, BandGrid::new(array![[-9999.0]], Some(-9999.0)));
        let out = compute(VegetationIndex::NDVI, &bands, &Mask::clear((1, 1))).unwrap();
        assert_eq!(out.value(0, 0), None);
    }

    #[test]
    fn ndvi_stays_in_unit_range() {
        // Deterministic pseudo-random reflectances in [-0.1, 1.5).
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64 * 1.6 - 0.1
        };
        let red = Array2::from_shape_simple_fn((40, 40), &mut next);
        let nir = Array2::from_shape_simple_fn((40, 40), &mut next);
        let mut bands = BTreeMap::new();
        bands.insert(Band::Red, BandGrid::new(red.clone(), Some(-9999.0)));
        bands.insert(Band::Nir, BandGrid::new(nir.clone(), Some(-9999.0)));
        let mut mask = Mask::clear((40, 40));
        mask.mask_nonpositive(&bands[&Band::Red]).unwrap();
        mask.mask_nonpositive(&bands[&Band::Nir]).unwrap();

        let out = compute(VegetationIndex::NDVI, &bands, &mask).unwrap();
        for ((r, c), &v) in out.values.indexed_iter() {
            if mask.is_masked(r, c) {
                assert_eq!(v, f64::from(FILL_VALUE));
            } else {
                assert!((-1.0..=1.0).contains(&v), "ndvi {v} at {r},{c}");
            }
        }
    }

    #[test]
    fn computation_is_deterministic() {
        let bands = single(&[(Band::Green, 0.08), (Band::Red, 0.06), (Band::Nir, 0.4)]);
        let mask = Mask::clear((1, 1));
        let a = compute(VegetationIndex::TVI, &bands, &mask).unwrap();
        let b = compute(VegetationIndex::TVI, &bands, &mask).unwrap();
        assert_eq!(a.values[[0, 0]].to_bits(), b.values[[0, 0]].to_bits());
        assert_eq!(a.encode(), b.encode());
        assert_eq!(a.encode()[[0, 0]], 2120);
    }

    #[test]
    fn missing_band_and_misaligned_band() {
        let bands = single(&[(Band::Red, 0.2)]);
        let err = compute(VegetationIndex::NDVI, &bands, &Mask::clear((1, 1))).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingBand {
                index: VegetationIndex::NDVI,
                band: Band::Nir
            }
        ));

        let bands = single(&[(Band::Red, 0.2), (Band::Nir, 0.5)]);
        let err = compute(VegetationIndex::NDVI, &bands, &Mask::clear((2, 1))).unwrap_err();
        assert!(matches!(err, Error::Alignment(_)));
    }

    #[test]
    fn bands_outside_the_sample_are_rejected() {
        let mut sample = Sample::default();
        for band in Band::REFLECTANCE {
            assert!(sample.slot(band).is_some(), "{band}");
        }
        assert!(sample.slot(Band::RedEdge1).is_none());

        let mut bands = single(&[(Band::Red, 0.2), (Band::Nir, 0.5)]);
        bands.insert(Band::RedEdge1, BandGrid::new(array![[0.3]], Some(-9999.0)));
        let err = bind_grids(
            VegetationIndex::NDVI,
            &[Band::Red, Band::RedEdge1],
            &bands,
            (1, 1),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingBand {
                index: VegetationIndex::NDVI,
                band: Band::RedEdge1
            }
        ));
    }

    #[test]
    fn encoding_rounds_saturates_and_avoids_fill() {
        assert_eq!(encode_value(0.42857, 0.0001), 4286);
        assert_eq!(encode_value(2.5, 1.0), 2);
        assert_eq!(encode_value(3.5, 1.0), 4);
        assert_eq!(encode_value(-1.0, 0.0001), -10_000);
        assert_eq!(encode_value(5.0, 0.0001), i16::MAX);
        assert_eq!(encode_value(-5.0, 0.0001), i16::MIN);
        assert_eq!(encode_value(-199.99, 0.01), FILL_VALUE + 1);
    }
}
