use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Direction of the alternative hypothesis.
///
/// The alternative selects how each standardized residual `z*` is mapped to a
/// per-draw p-value through the standard normal CDF `Φ`:
///
/// - [`Less`](Self::Less): `Φ(z*)`
/// - [`Greater`](Self::Greater): `1 - Φ(z*)`
/// - [`TwoSided`](Self::TwoSided): `2 * (1 - Φ(|z*|))`
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum Alternative {
    /// The case is expected to lie below the control population.
    #[display("less")]
    Less,
    /// The case is expected to lie above the control population.
    #[display("greater")]
    Greater,
    /// The case may deviate in either direction.
    #[default]
    #[display("two-sided")]
    TwoSided,
}

/// How the two-sided p-value is formed from the posterior draws.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum TwoSidedMethod {
    /// Twice the smaller of the two one-sided estimates, capped at 1.
    ///
    /// The credible interval is the doubled interval of that one-sided tail.
    #[default]
    #[display("doubled")]
    Doubled,
    /// Mean of `2 * (1 - Φ(|z*|))` over the draws.
    #[display("per-draw")]
    PerDraw,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown two-sided method '{input}' (expected doubled or per-draw)")]
pub struct ParseTwoSidedMethodError {
    input: String,
}

impl FromStr for TwoSidedMethod {
    type Err = ParseTwoSidedMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "doubled" => Ok(Self::Doubled),
            "per-draw" | "per_draw" => Ok(Self::PerDraw),
            _ => Err(ParseTwoSidedMethodError {
                input: s.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown alternative '{input}' (expected less, greater or two-sided)")]
pub struct ParseAlternativeError {
    input: String,
}

impl FromStr for Alternative {
    type Err = ParseAlternativeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "less" => Ok(Self::Less),
            "greater" => Ok(Self::Greater),
            "two-sided" | "two_sided" | "two.sided" | "twosided" => Ok(Self::TwoSided),
            _ => Err(ParseAlternativeError {
                input: s.to_owned(),
            }),
        }
    }
}

/// Default number of Monte Carlo draws per voxel.
pub const DEFAULT_ITERATIONS: usize = 10_000;

/// Default credible interval level.
pub const DEFAULT_CREDIBLE_LEVEL: f64 = 0.95;

/// Configuration of the per-voxel Bayesian test.
///
/// Missing fields fall back to their defaults when deserialized, so a JSON
/// configuration file only needs the values it changes:
///
/// ```
/// use voxbayes_engine::params::{Alternative, TestParameters};
///
/// let params: TestParameters = serde_json::from_str(r#"{"alternative": "less"}"#).unwrap();
/// assert_eq!(params.alternative, Alternative::Less);
/// assert_eq!(params.iterations, 10_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestParameters {
    /// Direction of the alternative hypothesis.
    pub alternative: Alternative,
    /// How two-sided p-values are formed; ignored for one-sided alternatives.
    pub two_sided: TwoSidedMethod,
    /// Probability mass covered by the credible interval, in (0, 1).
    pub credible_level: f64,
    /// Number of Monte Carlo posterior draws, at least 1.
    pub iterations: usize,
    /// Overrides the control sample size used for the degrees of freedom and
    /// the posterior scaling.
    pub sample_size: Option<usize>,
    /// Overrides the control sample standard deviation.
    pub sd: Option<f64>,
    /// Remove undefined (NaN) control values before testing instead of
    /// rejecting the voxel.
    pub drop_missing: bool,
}

impl Default for TestParameters {
    fn default() -> Self {
        Self {
            alternative: Alternative::default(),
            two_sided: TwoSidedMethod::default(),
            credible_level: DEFAULT_CREDIBLE_LEVEL,
            iterations: DEFAULT_ITERATIONS,
            sample_size: None,
            sd: None,
            drop_missing: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ParamError {
    #[display("credible interval level must lie strictly between 0 and 1, got {level}")]
    CredibleLevel { level: f64 },
    #[display("at least one Monte Carlo iteration is required")]
    ZeroIterations,
    #[display("sample size override must be at least 2, got {size}")]
    SampleSize { size: usize },
    #[display("standard deviation override must be finite and non-negative, got {sd}")]
    StandardDeviation { sd: f64 },
}

impl TestParameters {
    /// Checks every field against its documented range.
    pub fn validate(&self) -> Result<(), ParamError> {
        let level = self.credible_level;
        if !(level > 0.0 && level < 1.0) {
            return Err(ParamError::CredibleLevel { level });
        }
        if self.iterations == 0 {
            return Err(ParamError::ZeroIterations);
        }
        if let Some(size) = self.sample_size
            && size < 2
        {
            return Err(ParamError::SampleSize { size });
        }
        if let Some(sd) = self.sd
            && !(sd.is_finite() && sd >= 0.0)
        {
            return Err(ParamError::StandardDeviation { sd });
        }
        Ok(())
    }

    /// Lower and upper percentile points (0-100) of the credible interval.
    #[must_use]
    pub fn interval_percentiles(&self) -> (f64, f64) {
        let level = self.credible_level;
        ((1.0 - level) / 2.0 * 100.0, (1.0 + level) / 2.0 * 100.0)
    }
}
