//! Statistical building blocks for voxel-wise single-case testing.
//!
//! This crate provides the small set of statistics the test engine needs:
//!
//! - **Descriptive statistics**: Sample mean and unbiased standard deviation
//! - **Percentiles**: Linearly interpolated percentiles, used for credible intervals
//! - **Multiple comparison correction**: Benjamini–Hochberg FDR and Bonferroni
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing a control sample
//! - [`percentiles`]: Interpolated percentiles of sorted samples
//! - [`fdr`]: False discovery rate and family-wise error corrections
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use voxbayes_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! assert_eq!(stats.variance, 2.5);
//! ```
//!
//! ## Computing percentiles
//!
//! ```
//! use voxbayes_stats::percentiles::compute_percentile;
//!
//! let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
//! assert_eq!(compute_percentile(&sorted, 50.0), 3.0);
//! assert!((compute_percentile(&sorted, 97.5) - 4.9).abs() < 1e-12);
//! ```
//!
//! ## Correcting p-values
//!
//! ```
//! use voxbayes_stats::fdr;
//!
//! let adjusted = fdr::benjamini_hochberg(&[0.01, 0.04, 0.03, 0.005]).unwrap();
//! assert!((adjusted[3] - 0.02).abs() < 1e-12);
//! ```

pub mod descriptive;
pub mod fdr;
pub mod percentiles;
