//! Whole-volume application of the single-case test.
//!
//! [`run`] visits every voxel of a [`SampleSource`] in flat (x-fastest) order.
//! The buffer is split into one contiguous chunk per worker thread and each
//! voxel draws from its own generator (see [`crate::seed`]), so the output does
//! not depend on the number of workers.

use std::{
    num::NonZeroUsize,
    str::FromStr,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use serde::{Deserialize, Serialize};

use crate::{
    accessor::SampleSource,
    params::{ParamError, TestParameters},
    seed::{DEFAULT_BASE_SEED, VoxelSeed},
    volume::{Shape, Volume},
    voxel_test::{VoxelTestError, VoxelTester},
};

/// What to do when the test rejects a voxel's inputs.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidVoxelPolicy {
    /// Stop the run and report the first rejected voxel.
    #[default]
    #[display("abort")]
    Abort,
    /// Write NaN for the voxel and keep going.
    #[display("mark-undefined")]
    MarkUndefined,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown invalid-voxel policy '{input}' (expected abort or mark-undefined)")]
pub struct ParseInvalidVoxelPolicyError {
    input: String,
}

impl FromStr for InvalidVoxelPolicy {
    type Err = ParseInvalidVoxelPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "mark-undefined" | "mark_undefined" => Ok(Self::MarkUndefined),
            _ => Err(ParseInvalidVoxelPolicyError {
                input: s.to_owned(),
            }),
        }
    }
}

/// Execution settings that do not affect the statistics of a single voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Base seed every voxel's generator is derived from.
    pub seed: u64,
    /// Worker thread count; `None` uses the available parallelism.
    pub threads: Option<NonZeroUsize>,
    pub on_invalid: InvalidVoxelPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            seed: DEFAULT_BASE_SEED,
            threads: None,
            on_invalid: InvalidVoxelPolicy::default(),
        }
    }
}

impl RunOptions {
    fn worker_count(&self) -> usize {
        self.threads
            .or_else(|| thread::available_parallelism().ok())
            .map_or(1, NonZeroUsize::get)
    }
}

/// How many voxels ended up in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelCounts {
    pub total: usize,
    /// Voxels with a defined test result.
    pub tested: usize,
    /// Voxels outside the analysis mask.
    pub masked: usize,
    /// Voxels rejected under [`InvalidVoxelPolicy::MarkUndefined`].
    pub undefined: usize,
    /// Tested voxels whose controls had zero variance.
    pub degenerate: usize,
}

impl VoxelCounts {
    fn merge(&mut self, other: &Self) {
        self.tested += other.tested;
        self.masked += other.masked;
        self.undefined += other.undefined;
        self.degenerate += other.degenerate;
    }
}

/// Per-voxel output grids. Masked and undefined voxels hold NaN in every map.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelMaps {
    /// Monte Carlo p-value estimates.
    pub p_value: Volume,
    /// Lower credible bound of the p-value.
    pub p_lower: Volume,
    /// Upper credible bound of the p-value.
    pub p_upper: Volume,
    /// Effect size `(case - mean) / sd`.
    pub effect_size: Volume,
    pub counts: VoxelCounts,
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum RunError {
    #[display("invalid test parameters")]
    InvalidParameters(ParamError),
    #[display("voxel ({}, {}, {}) rejected", coord[0], coord[1], coord[2])]
    Voxel {
        coord: [usize; 3],
        source: VoxelTestError,
    },
}

#[derive(Debug, Clone, Copy)]
struct VoxelRecord {
    p_value: f64,
    p_lower: f64,
    p_upper: f64,
    effect_size: f64,
}

impl VoxelRecord {
    const UNDEFINED: Self = Self {
        p_value: f64::NAN,
        p_lower: f64::NAN,
        p_upper: f64::NAN,
        effect_size: f64::NAN,
    };
}

#[derive(Debug, Default)]
struct ChunkOutcome {
    counts: VoxelCounts,
    error: Option<(usize, VoxelTestError)>,
}

/// Tests every voxel of `source`.
///
/// With [`InvalidVoxelPolicy::Abort`] the error reported is always the one at
/// the lowest flat offset, whatever the worker count.
///
/// # Example
///
/// ```
/// use voxbayes_engine::{
///     accessor::VolumeStack,
///     iterator::{self, RunOptions},
///     params::TestParameters,
///     volume::{Shape, Volume},
/// };
///
/// let shape = Shape::new(2, 2, 1);
/// let case = Volume::new(shape, vec![5.0, 100.0, 5.0, 5.0]).unwrap();
/// let controls = (1..=9).map(|v| Volume::filled(shape, f64::from(v))).collect();
/// let stack = VolumeStack::new(case, controls).unwrap();
///
/// let params = TestParameters { iterations: 2_000, ..TestParameters::default() };
/// let maps = iterator::run(&stack, &params, &RunOptions::default()).unwrap();
/// assert!(maps.p_value.data()[1] < 0.01);
/// assert_eq!(maps.counts.tested, 4);
/// ```
pub fn run<S>(source: &S, params: &TestParameters, options: &RunOptions) -> Result<VoxelMaps, RunError>
where
    S: SampleSource + ?Sized,
{
    let shape = source.shape();
    let len = shape.len();
    let workers = options.worker_count().clamp(1, len.max(1));
    let chunk_len = len.div_ceil(workers).max(1);

    let mut records = vec![VoxelRecord::UNDEFINED; len];
    let mut testers = records
        .chunks(chunk_len)
        .map(|_| VoxelTester::new(*params))
        .collect::<Result<Vec<_>, _>>()
        .map_err(RunError::InvalidParameters)?;

    tracing::info!(
        %shape,
        controls = source.control_count(),
        workers,
        seed = options.seed,
        "testing voxels"
    );

    let first_error = AtomicUsize::new(usize::MAX);
    let outcomes = thread::scope(|s| {
        let handles = records
            .chunks_mut(chunk_len)
            .zip(&mut testers)
            .enumerate()
            .map(|(index, (chunk, tester))| {
                let first_error = &first_error;
                s.spawn(move || {
                    let start = index * chunk_len;
                    let outcome = test_chunk(
                        source,
                        shape,
                        start,
                        chunk,
                        tester,
                        options,
                        first_error,
                    );
                    tracing::info!(
                        chunk = index,
                        start,
                        voxels = chunk.len(),
                        tested = outcome.counts.tested,
                        "chunk finished"
                    );
                    outcome
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect::<Vec<_>>()
    });

    let mut counts = VoxelCounts {
        total: len,
        ..VoxelCounts::default()
    };
    let mut error: Option<(usize, VoxelTestError)> = None;
    for outcome in outcomes {
        counts.merge(&outcome.counts);
        if let Some((offset, e)) = outcome.error
            && error.as_ref().is_none_or(|(first, _)| offset < *first)
        {
            error = Some((offset, e));
        }
    }
    if let Some((offset, source)) = error {
        let coord = shape.coord_of(offset);
        tracing::error!(?coord, %source, "voxel rejected, aborting run");
        return Err(RunError::Voxel { coord, source });
    }

    if counts.degenerate > 0 {
        tracing::warn!(
            voxels = counts.degenerate,
            "controls had zero variance; standard deviation floored"
        );
    }
    if counts.undefined > 0 {
        tracing::warn!(voxels = counts.undefined, "voxels marked undefined");
    }
    tracing::info!(
        tested = counts.tested,
        masked = counts.masked,
        undefined = counts.undefined,
        "voxel tests finished"
    );

    Ok(into_maps(shape, &records, counts))
}

fn test_chunk<S>(
    source: &S,
    shape: Shape,
    start: usize,
    chunk: &mut [VoxelRecord],
    tester: &mut VoxelTester,
    options: &RunOptions,
    first_error: &AtomicUsize,
) -> ChunkOutcome
where
    S: SampleSource + ?Sized,
{
    let mut outcome = ChunkOutcome::default();
    let mut controls = Vec::with_capacity(source.control_count());

    for (offset, record) in (start..).zip(chunk.iter_mut()) {
        // A lower offset has already failed; nothing here can be reported.
        if offset > first_error.load(Ordering::Relaxed) {
            break;
        }
        if source.is_masked_out(offset) {
            outcome.counts.masked += 1;
            continue;
        }

        let coord = shape.coord_of(offset);
        source.control_values_into(offset, &mut controls);
        let mut rng = VoxelSeed::derive(options.seed, coord).rng();
        match tester.test(source.case_value(offset), &controls, &mut rng) {
            Ok(result) => {
                *record = VoxelRecord {
                    p_value: result.p_value,
                    p_lower: result.p_interval.lower,
                    p_upper: result.p_interval.upper,
                    effect_size: result.effect_size,
                };
                outcome.counts.tested += 1;
                if result.degenerate_variance {
                    outcome.counts.degenerate += 1;
                    tracing::trace!(?coord, "zero control variance");
                }
            }
            Err(e) => match options.on_invalid {
                InvalidVoxelPolicy::Abort => {
                    first_error.fetch_min(offset, Ordering::Relaxed);
                    outcome.error = Some((offset, e));
                    break;
                }
                InvalidVoxelPolicy::MarkUndefined => {
                    tracing::trace!(?coord, error = %e, "voxel marked undefined");
                    outcome.counts.undefined += 1;
                }
            },
        }
    }
    outcome
}

fn into_maps(shape: Shape, records: &[VoxelRecord], counts: VoxelCounts) -> VoxelMaps {
    let map = |f: fn(&VoxelRecord) -> f64| {
        let mut volume = Volume::filled(shape, f64::NAN);
        for (dst, record) in volume.data_mut().iter_mut().zip(records) {
            *dst = f(record);
        }
        volume
    };
    VoxelMaps {
        p_value: map(|r| r.p_value),
        p_lower: map(|r| r.p_lower),
        p_upper: map(|r| r.p_upper),
        effect_size: map(|r| r.effect_size),
        counts,
    }
}
