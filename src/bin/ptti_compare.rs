use std::path::PathBuf;

use clap::Parser;
use ptti::{stats::CompareOptions, system::ComparisonInputs, PttiResult};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "ptti-compare",
    author,
    version,
    about = "Comparison between different runs of the same model"
)]
struct Cli {
    /// .tsv file containing the results to compare
    input: PathBuf,

    /// .tsv file containing the reference results
    reference: PathBuf,

    /// .tsv file containing the standard deviation of the reference results.
    /// Without it only absolute and relative errors are computed
    #[arg(long, visible_alias = "rstd")]
    reference_std: Option<PathBuf>,

    /// Number of leading columns of the two runs to compare
    #[arg(long, visible_alias = "cols")]
    columns: Option<usize>,

    /// Skip the first several datapoints
    #[arg(long, default_value_t = 0)]
    skip: usize,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, default_value = "warn")]
    loglevel: String,
}

fn run(cli: &Cli) -> PttiResult<()> {
    let inputs = ComparisonInputs::load(&cli.input, &cli.reference, cli.reference_std.as_deref())?;
    if cli.columns.is_none() {
        println!("Comparing first {} columns", inputs.default_columns());
    }
    let options = CompareOptions {
        columns: cli.columns,
        skip: cli.skip,
    };
    let (_, written) = inputs.compare(&cli.input, options)?;
    for path in written {
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.loglevel)))
        .with(fmt::layer())
        .init();

    if let Err(e) = run(&cli) {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
