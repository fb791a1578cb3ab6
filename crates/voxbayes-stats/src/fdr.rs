//! Multiple comparison correction for families of p-values.
//!
//! A whole-volume analysis runs one test per voxel, so raw p-values must be
//! adjusted before thresholding. The main entry point is
//! [`benjamini_hochberg`], which controls the false discovery rate (FDR).
//! [`bonferroni`] is provided for comparison; it controls the family-wise error
//! rate and is far more conservative at volume scale.
//!
//! # Benjamini–Hochberg
//!
//! For `m` p-values sorted ascending, `p_(1) <= ... <= p_(m)`:
//!
//! 1. raw adjustment `a_r = p_(r) * m / r`
//! 2. running minimum from rank `m` down to rank 1
//! 3. clip to `[0, 1]`
//! 4. scatter back to the input order
//!
//! Ties are ranked by their original position, so the permutation is stable.
//! The adjustment needs the full sorted family; there is no incremental form.

/// Error returned when a p-value family cannot be corrected.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum FdrError {
    #[display("p-value at index {index} is outside [0, 1]: {value}")]
    OutOfRange { index: usize, value: f64 },
}

/// Benjamini–Hochberg adjusted p-values, in input order.
///
/// Every entry must lie in `[0, 1]`; NaN is rejected. Use
/// [`benjamini_hochberg_ignoring_nan`] when undefined entries are expected.
///
/// # Examples
///
/// ```
/// use voxbayes_stats::fdr::benjamini_hochberg;
///
/// let adjusted = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.005]).unwrap();
/// // sorted: 0.005, 0.01, 0.03, 0.04 -> raw 0.02, 0.02, 0.04, 0.04
/// assert!((adjusted[0] - 0.02).abs() < 1e-12);
/// assert!((adjusted[1] - 0.04).abs() < 1e-12);
/// assert!((adjusted[2] - 0.04).abs() < 1e-12);
/// assert!((adjusted[3] - 0.02).abs() < 1e-12);
/// ```
pub fn benjamini_hochberg(p_values: &[f64]) -> Result<Vec<f64>, FdrError> {
    validate(p_values)?;
    let mut adjusted = vec![0.0; p_values.len()];
    let indices = (0..p_values.len()).collect::<Vec<_>>();
    adjust_into(p_values, indices, &mut adjusted);
    Ok(adjusted)
}

/// Like [`benjamini_hochberg`], but NaN entries are left out of the family.
///
/// NaN entries do not count toward `m` and stay NaN in the output.
///
/// ```
/// use voxbayes_stats::fdr::benjamini_hochberg_ignoring_nan;
///
/// let adjusted = benjamini_hochberg_ignoring_nan(&[0.01, f64::NAN, 0.02]).unwrap();
/// assert!((adjusted[0] - 0.02).abs() < 1e-12);
/// assert!(adjusted[1].is_nan());
/// assert!((adjusted[2] - 0.02).abs() < 1e-12);
/// ```
pub fn benjamini_hochberg_ignoring_nan(p_values: &[f64]) -> Result<Vec<f64>, FdrError> {
    let defined = p_values
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    for &index in &defined {
        check_range(index, p_values[index])?;
    }
    let mut adjusted = vec![f64::NAN; p_values.len()];
    adjust_into(p_values, defined, &mut adjusted);
    Ok(adjusted)
}

/// Bonferroni adjusted p-values: `min(p * m, 1)`.
///
/// ```
/// use voxbayes_stats::fdr::bonferroni;
///
/// assert_eq!(bonferroni(&[0.01, 0.5]).unwrap(), vec![0.02, 1.0]);
/// ```
#[expect(clippy::cast_precision_loss)]
pub fn bonferroni(p_values: &[f64]) -> Result<Vec<f64>, FdrError> {
    validate(p_values)?;
    let m = p_values.len() as f64;
    Ok(p_values.iter().map(|&p| (p * m).min(1.0)).collect())
}

/// Adjusts the family `p_values[indices]` and writes results at the same indices.
#[expect(clippy::cast_precision_loss)]
fn adjust_into(p_values: &[f64], mut indices: Vec<usize>, adjusted: &mut [f64]) {
    // `sort_by` is stable, so equal p-values keep their original index order.
    indices.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let m = indices.len() as f64;
    let mut running_min = f64::INFINITY;
    for (rank0, &index) in indices.iter().enumerate().rev() {
        let rank = (rank0 + 1) as f64;
        let raw = p_values[index] * m / rank;
        running_min = running_min.min(raw);
        adjusted[index] = running_min.clamp(0.0, 1.0);
    }
}

fn validate(p_values: &[f64]) -> Result<(), FdrError> {
    p_values
        .iter()
        .enumerate()
        .try_for_each(|(index, &value)| check_range(index, value))
}

fn check_range(index: usize, value: f64) -> Result<(), FdrError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(FdrError::OutOfRange { index, value })
    }
}
