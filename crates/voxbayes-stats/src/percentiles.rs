//! Percentiles of Monte Carlo samples.
//!
//! Credible intervals are read off the sorted per-draw values, so only the
//! single-point form is needed here.

/// Value at `percentile` (0-100) of ascending `sorted_values`.
///
/// Uses linear interpolation between the two closest order statistics: for `n`
/// values the k-th percentile sits at fractional rank `(n - 1) * k / 100`.
/// Percentiles outside 0-100 are clamped.
///
/// Returns NaN for an empty slice.
///
/// ```
/// use voxbayes_stats::percentiles::compute_percentile;
///
/// let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
///
/// assert_eq!(compute_percentile(&values, 50.0), 3.0);
/// assert_eq!(compute_percentile(&values, 25.0), 2.0);
/// assert_eq!(compute_percentile(&values, 12.5), 1.5);
/// ```
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn compute_percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    let Some(&last) = sorted_values.last() else {
        return f64::NAN;
    };
    let rank = (sorted_values.len() - 1) as f64 * percentile.clamp(0.0, 100.0) / 100.0;
    let lower = rank.floor() as usize;
    if lower + 1 >= sorted_values.len() {
        return last;
    }
    let frac = rank - rank.floor();
    let (a, b) = (sorted_values[lower], sorted_values[lower + 1]);
    a + frac * (b - a)
}
