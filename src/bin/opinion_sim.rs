//! Command line driver for opinion dynamics simulations.
//!
//! ```text
//! opinion-sim config.toml -o output/ --agents initial_agents.txt
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use opinion_dynamics::{Simulation, SimulationOptions};

#[derive(Parser)]
#[command(name = "opinion-sim")]
#[command(version)]
#[command(about = "Simulate opinion dynamics on a rewiring social network", long_about = None)]
struct Cli {
    /// TOML configuration file
    config: PathBuf,

    /// Directory for opinion and network snapshots
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Network file to use instead of generating one
    #[arg(long)]
    network: Option<PathBuf>,

    /// Agent file overriding the initial agent state
    #[arg(long)]
    agents: Option<PathBuf>,

    /// Log every iteration
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: &Cli) -> opinion_dynamics::Result<()> {
    let options = SimulationOptions::from_file(&cli.config)?;
    tracing::info!(config = %cli.config.display(), "loaded configuration");

    let mut simulation = Simulation::new(options, cli.network.as_deref(), cli.agents.as_deref())?;
    let history = simulation.run(cli.output.as_deref())?;

    if let Some(last) = history.last() {
        tracing::info!(
            iterations = last.iteration,
            max_opinion_change = last.max_opinion_change,
            mean_opinion = last.mean_opinion,
            opinion_variance = last.opinion_variance,
            seed = simulation.seed(),
            "done"
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
