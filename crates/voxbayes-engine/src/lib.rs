//! Voxel-wise Bayesian single-case testing.
//!
//! A case volume is compared voxel by voxel against a set of control volumes.
//! At each voxel the [`voxel_test`] module estimates a posterior predictive
//! p-value by Monte Carlo, the [`iterator`] applies it across the grid in
//! parallel, and [`correction`] adjusts the finished p-value volume for
//! multiple comparisons.
//!
//! # Example
//!
//! ```
//! use voxbayes_engine::{
//!     accessor::VolumeStack,
//!     correction,
//!     iterator::{self, RunOptions},
//!     params::TestParameters,
//!     volume::{Shape, Volume},
//! };
//!
//! let shape = Shape::new(3, 1, 1);
//! let case = Volume::new(shape, vec![5.0, 40.0, 5.5]).unwrap();
//! let controls = (1..=9).map(|v| Volume::filled(shape, f64::from(v))).collect();
//! let stack = VolumeStack::new(case, controls).unwrap();
//!
//! let params = TestParameters { iterations: 1_000, ..TestParameters::default() };
//! let maps = iterator::run(&stack, &params, &RunOptions::default()).unwrap();
//! let corrected = correction::correct_volume(&maps.p_value).unwrap();
//! assert!(corrected.data()[1] < 0.05);
//! ```

pub mod accessor;
pub mod correction;
pub mod iterator;
pub mod params;
pub mod seed;
pub mod volume;
