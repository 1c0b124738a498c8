use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ptti::{
    config::RawConfig,
    model::ModelRegistry,
    resolver::Overrides,
    runtime::{ClusterConfig, ExecutionMode, RuntimeError},
    system::{write_batch, Simulation},
    PttiResult,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "ptti",
    author,
    version,
    about = "Population-wide Testing, Tracing and Isolation Models"
)]
struct Cli {
    /// Select model: SEIRCTODEMem, SEIRODE, SEIRSSA
    #[arg(short, long)]
    model: Option<String>,

    /// Population size
    #[arg(short = 'N', value_name = "N")]
    population: Option<i64>,

    /// Initial infected population
    #[arg(long = "IU", value_name = "IU")]
    infected: Option<i64>,

    /// Simulation end time
    #[arg(long)]
    tmax: Option<f64>,

    /// Simulation reporting time-steps
    #[arg(long)]
    steps: Option<usize>,

    /// Number of samples
    #[arg(long)]
    samples: Option<usize>,

    /// YAML file describing parameters and interventions
    #[arg(short, long)]
    yaml: Option<PathBuf>,

    /// Output file base name
    #[arg(short, long)]
    output: Option<String>,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    loglevel: String,

    /// Save average and standard deviation files
    #[arg(short, long)]
    statistics: bool,

    /// Print the model's initial state and exit
    #[arg(long)]
    dump_state: bool,

    /// Execute samples in parallel
    #[arg(long)]
    parallel: bool,

    /// Local worker count (defaults to the available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Set a parameter, name=value (repeatable)
    #[arg(short, long = "var", value_name = "NAME=VALUE", value_parser = Overrides::parse_var)]
    var: Vec<(String, f64)>,

    /// Rank of this process in a distributed run
    #[arg(long, env = "PMIX_RANK")]
    rank: Option<usize>,

    /// Number of processes in a distributed run
    #[arg(long, env = "PMIX_SIZE")]
    world_size: Option<usize>,

    /// host:port of the distributed coordinator
    #[arg(long, env = "PTTI_COORDINATOR")]
    coordinator: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            model: self.model.clone(),
            tmax: self.tmax,
            steps: self.steps,
            samples: self.samples,
            output: self.output.clone(),
            population: self.population,
            infected: self.infected,
            vars: self.var.clone(),
        }
    }

    fn cluster(&self) -> PttiResult<Option<ClusterConfig>> {
        match (self.rank, self.world_size) {
            (None, None) => Ok(None),
            (rank, Some(size)) => Ok(Some(ClusterConfig {
                rank: rank.unwrap_or(0),
                size,
                coordinator: self.coordinator.clone(),
            })),
            (Some(rank), None) => Err(RuntimeError::DistributedUnavailable(format!(
                "rank {} given without a world size",
                rank
            ))
            .into()),
        }
    }
}

async fn run(cli: Cli) -> PttiResult<()> {
    let registry = Arc::new(ModelRegistry::with_builtins());
    let cluster = cli.cluster()?;

    // worker ranks only serve their chunk
    if let Some(cluster) = cluster.as_ref().filter(|c| !c.is_coordinator()) {
        return Simulation::new(registry, Overrides::default(), ExecutionMode::Sequential)
            .serve(cluster)
            .await;
    }

    let template = match &cli.yaml {
        Some(path) => RawConfig::from_file(path)?,
        None => RawConfig::new(),
    };

    let mode = match (cli.parallel, cluster) {
        (false, _) => ExecutionMode::Sequential,
        (true, Some(cluster)) if cluster.size > 1 => ExecutionMode::Distributed(cluster),
        (true, _) => ExecutionMode::Pool {
            workers: cli.workers,
        },
    };
    let simulation = Simulation::new(registry, cli.overrides(), mode);

    if cli.dump_state {
        let state = simulation.initial_state(&template)?;
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let batch = simulation.run(&template).await?;
    let written = write_batch(&batch, cli.statistics)?;
    info!("Done: {} samples, {} files", batch.samples.len(), written.len());
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.loglevel)))
        .with(fmt::layer())
        .init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
