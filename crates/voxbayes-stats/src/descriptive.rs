/// Descriptive statistics summarizing a sample.
///
/// Dispersion is reported with the unbiased estimator (divisor `n - 1`), which
/// is what the posterior variance draws are scaled by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptiveStats {
    /// The number of values in the sample.
    pub count: usize,
    /// The minimum value in the sample.
    pub min: f64,
    /// The maximum value in the sample.
    pub max: f64,
    /// The arithmetic mean of the sample.
    pub mean: f64,
    /// The unbiased sample variance.
    pub variance: f64,
    /// The unbiased sample standard deviation.
    pub std_dev: f64,
}

impl DescriptiveStats {
    /// Computes descriptive statistics from values.
    ///
    /// # Arguments
    ///
    /// * `values` - An iterator over `f64` values
    ///
    /// # Returns
    ///
    /// * `Some(DescriptiveStats)` - if the sample contains at least two values
    /// * `None` - if the sample has fewer than two values (the unbiased variance is undefined)
    ///
    /// NaN values are not filtered; a NaN in the input yields NaN statistics.
    ///
    /// # Examples
    ///
    /// ```
    /// # use voxbayes_stats::descriptive::DescriptiveStats;
    /// let values = [5.0, 2.0, 4.0, 1.0, 3.0];
    /// let stats = DescriptiveStats::new(values).unwrap();
    /// assert_eq!(stats.min, 1.0);
    /// assert_eq!(stats.max, 5.0);
    /// assert_eq!(stats.mean, 3.0);
    /// assert_eq!(stats.variance, 2.5);
    ///
    /// assert!(DescriptiveStats::new([1.0]).is_none());
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let values = values.into_iter().collect::<Vec<_>>();
        let count = values.len();
        if count < 2 {
            return None;
        }
        let mean = mean(&values)?;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;

        Some(Self {
            count,
            min,
            max,
            mean,
            variance,
            std_dev: variance.sqrt(),
        })
    }
}

/// Arithmetic mean of `values`, or `None` if empty.
///
/// ```
/// # use voxbayes_stats::descriptive::mean;
/// assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
/// assert_eq!(mean(&[]), None);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbiased_variance() {
        let stats = DescriptiveStats::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]).unwrap();
        assert_eq!(stats.count, 9);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.variance - 7.5).abs() < 1e-12);
        assert!((stats.std_dev - 7.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_sample_has_zero_variance() {
        let stats = DescriptiveStats::new([4.2; 6]).unwrap();
        assert_eq!(stats.variance, 0.0);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.min, stats.max);
    }

    #[test]
    fn test_nan_propagates() {
        let stats = DescriptiveStats::new([1.0, f64::NAN, 3.0]).unwrap();
        assert!(stats.mean.is_nan());
        assert!(stats.std_dev.is_nan());
    }

    #[test]
    fn test_too_few_values() {
        assert!(DescriptiveStats::new([]).is_none());
        assert!(DescriptiveStats::new([3.0]).is_none());
    }
}
