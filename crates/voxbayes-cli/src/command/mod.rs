use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use self::{correct::CorrectArg, run::RunArg};

mod correct;
mod run;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Log verbosity (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Test a case volume against control volumes and correct for multiple comparisons
    Run(#[clap(flatten)] RunArg),
    /// FDR-correct an existing p-value volume
    Correct(#[clap(flatten)] CorrectArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_tracing(args.log_level);
    match args.mode {
        Mode::Run(arg) => run::run(&arg)?,
        Mode::Correct(arg) => correct::run(&arg)?,
    }
    Ok(())
}

fn init_tracing(level: tracing::Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
