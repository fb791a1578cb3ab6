//! Multiple comparison correction over whole volumes.
//!
//! Correction runs once the complete p-value volume exists. The volume buffer
//! is already flat, so it is passed to [`voxbayes_stats::fdr`] as is and the
//! adjusted values are written back in the same order. Undefined (NaN) voxels
//! are left out of the family and stay NaN.

use serde::{Deserialize, Serialize};
use voxbayes_stats::fdr::{self, FdrError};

use crate::volume::Volume;

/// Benjamini–Hochberg adjusted copy of `p_values`.
///
/// ```
/// use voxbayes_engine::{correction, volume::{Shape, Volume}};
///
/// let p = Volume::new(Shape::new(2, 2, 1), vec![0.01, 0.04, f64::NAN, 0.03]).unwrap();
/// let q = correction::correct_volume(&p).unwrap();
/// assert_eq!(q.shape(), p.shape());
/// assert!((q.data()[0] - 0.03).abs() < 1e-12);
/// assert!(q.data()[2].is_nan());
/// ```
pub fn correct_volume(p_values: &Volume) -> Result<Volume, FdrError> {
    let adjusted = fdr::benjamini_hochberg_ignoring_nan(p_values.data())?;
    Ok(with_data(p_values, &adjusted))
}

/// Bonferroni adjusted copy of `p_values`, with `m` the number of defined voxels.
pub fn bonferroni_volume(p_values: &Volume) -> Result<Volume, FdrError> {
    let (defined, offsets): (Vec<f64>, Vec<usize>) = p_values
        .data()
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .map(|(offset, &p)| (p, offset))
        .unzip();
    let adjusted = fdr::bonferroni(&defined)?;

    let mut out = Volume::filled(p_values.shape(), f64::NAN);
    for (offset, q) in offsets.into_iter().zip(adjusted) {
        out.data_mut()[offset] = q;
    }
    Ok(out)
}

fn with_data(template: &Volume, data: &[f64]) -> Volume {
    let mut out = template.clone();
    out.data_mut().copy_from_slice(data);
    out
}

/// Voxel counts at or below a significance threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Significance {
    pub alpha: f64,
    pub raw: usize,
    pub fdr: usize,
    pub bonferroni: usize,
}

impl Significance {
    /// Counts the voxels of `raw` significant at `alpha` before correction,
    /// after FDR correction and after Bonferroni correction.
    pub fn count(raw: &Volume, alpha: f64) -> Result<Self, FdrError> {
        let fdr = correct_volume(raw)?;
        let bonferroni = bonferroni_volume(raw)?;
        Ok(Self {
            alpha,
            raw: count_at_most(raw, alpha),
            fdr: count_at_most(&fdr, alpha),
            bonferroni: count_at_most(&bonferroni, alpha),
        })
    }
}

/// Number of defined voxels with value `<= threshold`.
#[must_use]
pub fn count_at_most(volume: &Volume, threshold: f64) -> usize {
    volume.data().iter().filter(|&&v| v <= threshold).count()
}

/// Smallest defined value in `volume`.
#[must_use]
pub fn min_defined(volume: &Volume) -> Option<f64> {
    volume
        .data()
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .min_by(f64::total_cmp)
}
