use std::path::PathBuf;

use anyhow::Context as _;
use voxbayes_engine::correction;
use voxbayes_io::nifti;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct CorrectArg {
    /// Uncorrected p-value volume; NaN voxels are left out of the correction
    #[arg(long)]
    input: PathBuf,
    /// Output path of the FDR-corrected volume
    #[arg(long)]
    output: PathBuf,
}

pub(crate) fn run(arg: &CorrectArg) -> anyhow::Result<()> {
    let image = nifti::read_volume(&arg.input)?;
    let corrected = correction::correct_volume(&image.volume)
        .with_context(|| format!("Failed to correct {}", arg.input.display()))?;
    nifti::write_volume(&arg.output, &corrected, &image.transform)?;

    tracing::info!(
        input = %arg.input.display(),
        output = %arg.output.display(),
        min_q = correction::min_defined(&corrected),
        "wrote FDR-corrected volume"
    );
    Ok(())
}
