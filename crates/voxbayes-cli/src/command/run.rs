use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::TempPath;
use voxbayes_engine::{
    accessor::VolumeStack,
    correction::{self, Significance},
    iterator::{self, InvalidVoxelPolicy, RunOptions, VoxelCounts},
    params::{Alternative, TestParameters, TwoSidedMethod},
    seed::DEFAULT_BASE_SEED,
    volume::{SpatialTransform, Volume},
};
use voxbayes_io::{
    discovery::{ControlDiscovery, DEFAULT_CONTROL_PATTERN},
    nifti,
};

use crate::util;

/// Threshold used for the significance counts in the run summary.
const SUMMARY_ALPHA: f64 = 0.05;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RunArg {
    /// Case volume (.nii or .nii.gz)
    #[arg(long)]
    case: PathBuf,
    /// Control volume; repeat for each control
    #[arg(long = "control", value_name = "PATH")]
    controls: Vec<PathBuf>,
    /// Directory scanned for additional control volumes
    #[arg(long, value_name = "DIR")]
    control_dir: Option<PathBuf>,
    /// Regular expression matched against file names in --control-dir
    #[arg(long, default_value = DEFAULT_CONTROL_PATTERN)]
    control_pattern: String,
    /// Only test voxels where this volume is non-zero
    #[arg(long)]
    mask: Option<PathBuf>,
    /// JSON file with test parameters; the options below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Alternative hypothesis (less, greater, two-sided)
    #[arg(long)]
    alternative: Option<Alternative>,
    /// Two-sided p-value method (doubled, per-draw)
    #[arg(long)]
    two_sided: Option<TwoSidedMethod>,
    /// Credible interval level in (0, 1)
    #[arg(long)]
    credible_level: Option<f64>,
    /// Monte Carlo draws per voxel
    #[arg(long)]
    iterations: Option<usize>,
    /// Override the control sample size
    #[arg(long)]
    sample_size: Option<usize>,
    /// Override the control standard deviation
    #[arg(long)]
    sd: Option<f64>,
    /// Drop undefined control values instead of rejecting the voxel
    #[arg(long)]
    drop_missing: bool,
    /// What to do with voxels the test rejects (abort, mark-undefined)
    #[arg(long, default_value_t = InvalidVoxelPolicy::Abort)]
    on_invalid: InvalidVoxelPolicy,
    /// Base seed of the per-voxel random streams
    #[arg(long, default_value_t = DEFAULT_BASE_SEED)]
    seed: u64,
    /// Worker threads (defaults to the available parallelism)
    #[arg(long)]
    threads: Option<NonZeroUsize>,
    /// Output path of the uncorrected p-value volume
    #[arg(long)]
    output_raw: PathBuf,
    /// Output path of the FDR-corrected p-value volume
    #[arg(long)]
    output_corrected: PathBuf,
    /// Output path of the lower credible bound volume
    #[arg(long)]
    output_interval_low: Option<PathBuf>,
    /// Output path of the upper credible bound volume
    #[arg(long)]
    output_interval_high: Option<PathBuf>,
    /// Output path of the effect size volume
    #[arg(long)]
    output_effect: Option<PathBuf>,
    /// Run summary JSON path (defaults to stdout)
    #[arg(long)]
    summary: Option<PathBuf>,
}

impl RunArg {
    fn test_parameters(&self) -> anyhow::Result<TestParameters> {
        let mut params = match &self.config {
            Some(path) => util::read_json_file::<TestParameters>("config", path)?,
            None => TestParameters::default(),
        };
        self.apply_overrides(&mut params);
        params
            .validate()
            .context("Invalid test parameters")?;
        Ok(params)
    }

    fn apply_overrides(&self, params: &mut TestParameters) {
        if let Some(alternative) = self.alternative {
            params.alternative = alternative;
        }
        if let Some(method) = self.two_sided {
            params.two_sided = method;
        }
        if let Some(level) = self.credible_level {
            params.credible_level = level;
        }
        if let Some(iterations) = self.iterations {
            params.iterations = iterations;
        }
        if self.sample_size.is_some() {
            params.sample_size = self.sample_size;
        }
        if self.sd.is_some() {
            params.sd = self.sd;
        }
        if self.drop_missing {
            params.drop_missing = true;
        }
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            seed: self.seed,
            threads: self.threads,
            on_invalid: self.on_invalid,
        }
    }

    fn control_paths(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut paths = self.controls.clone();
        if let Some(dir) = &self.control_dir {
            let discovered = ControlDiscovery::new(&self.control_pattern)?
                .exclude(&self.case)
                .discover(dir)?;
            paths.extend(discovered);
        }
        anyhow::ensure!(
            !paths.is_empty(),
            "No control volumes given; use --control or --control-dir"
        );
        Ok(paths)
    }
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    case: &'a Path,
    controls: &'a [PathBuf],
    mask: Option<&'a Path>,
    parameters: TestParameters,
    seed: u64,
    on_invalid: InvalidVoxelPolicy,
    shape: [usize; 3],
    voxels: VoxelCounts,
    significant: Significance,
    min_p: MinP,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct MinP {
    raw: Option<f64>,
    fdr: Option<f64>,
}

pub(crate) fn run(arg: &RunArg) -> anyhow::Result<()> {
    let started_at = Utc::now();
    let params = arg.test_parameters()?;
    let options = arg.run_options();
    let control_paths = arg.control_paths()?;

    let case = nifti::read_volume(&arg.case)?;
    tracing::info!(path = %arg.case.display(), shape = %case.volume.shape(), "loaded case volume");
    let transform = case.transform;
    let stack = load_stack(case.volume, &control_paths, arg.mask.as_deref())?;

    let maps = iterator::run(&stack, &params, &options).context("Voxel testing failed")?;
    let corrected = correction::correct_volume(&maps.p_value)
        .context("Failed to correct p-values for multiple comparisons")?;
    let significant = Significance::count(&maps.p_value, SUMMARY_ALPHA)?;

    // Nothing is written until both phases have succeeded, and no output is
    // moved into place until every one of them has been written.
    let optional = [
        (&arg.output_interval_low, &maps.p_lower),
        (&arg.output_interval_high, &maps.p_upper),
        (&arg.output_effect, &maps.effect_size),
    ];
    let mut outputs = StagedOutputs::default();
    outputs.stage(&arg.output_raw, &maps.p_value, &transform)?;
    outputs.stage(&arg.output_corrected, &corrected, &transform)?;
    for (path, volume) in optional {
        if let Some(path) = path {
            outputs.stage(path, volume, &transform)?;
        }
    }
    outputs.commit()?;

    tracing::info!(
        raw = significant.raw,
        fdr = significant.fdr,
        bonferroni = significant.bonferroni,
        alpha = SUMMARY_ALPHA,
        "significant voxels"
    );

    let shape = stack.case().shape();
    let summary = RunSummary {
        case: &arg.case,
        controls: &control_paths,
        mask: arg.mask.as_deref(),
        parameters: params,
        seed: options.seed,
        on_invalid: options.on_invalid,
        shape: [shape.nx, shape.ny, shape.nz],
        voxels: maps.counts,
        significant,
        min_p: MinP {
            raw: correction::min_defined(&maps.p_value),
            fdr: correction::min_defined(&corrected),
        },
        started_at,
        finished_at: Utc::now(),
    };
    util::write_json(&summary, arg.summary.as_deref())
}

fn load_stack(
    case: Volume,
    control_paths: &[PathBuf],
    mask: Option<&Path>,
) -> anyhow::Result<VolumeStack> {
    let controls = control_paths
        .iter()
        .map(|path| nifti::read_volume(path).map(|image| image.volume))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!(count = controls.len(), "loaded control volumes");

    let stack = VolumeStack::new(case, controls)
        .context("Control volumes do not share the case volume's grid")?;
    match mask {
        Some(path) => {
            let mask = nifti::read_volume(path)?.volume;
            stack
                .with_mask(mask)
                .context("Mask does not share the case volume's grid")
        }
        None => Ok(stack),
    }
}

/// Output volumes written to hidden files beside their destinations.
///
/// Staged files are removed on drop unless [`StagedOutputs::commit`] renamed
/// them. A rename that fails part way can still leave earlier outputs in place.
#[derive(Debug, Default)]
struct StagedOutputs {
    staged: Vec<(TempPath, PathBuf)>,
}

impl StagedOutputs {
    fn stage(
        &mut self,
        path: &Path,
        volume: &Volume,
        transform: &SpatialTransform,
    ) -> anyhow::Result<()> {
        let name = path
            .file_name()
            .with_context(|| format!("Output path has no file name: {}", path.display()))?;
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        // Keep the destination name as the suffix so `.gz` still selects compression.
        let suffix = format!("-{}", name.to_string_lossy());

        let mut builder = tempfile::Builder::new();
        builder.prefix(".voxbayes-").suffix(&suffix);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            builder.permissions(std::fs::Permissions::from_mode(0o644));
        }
        let temp = builder
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create a staging file in {}", dir.display()))?
            .into_temp_path();

        nifti::write_volume(&temp, volume, transform)?;
        self.staged.push((temp, path.to_owned()));
        Ok(())
    }

    fn commit(self) -> anyhow::Result<()> {
        for (temp, path) in self.staged {
            temp.persist(&path)
                .with_context(|| format!("Failed to move output into {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote volume");
        }
        Ok(())
    }
}
