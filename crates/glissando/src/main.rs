use anyhow::Result;
use clap::{Parser, Subcommand};
use glissando::cli;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Smooth(args) => args.run(),
        Command::Inspect(args) => args.run(),
    }
}

#[derive(Parser)]
#[command(name = "glissando", about = "Jerk-limited smoothing for joint trajectories")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Smooth a trajectory with the built-in jerk-limited generator.
    Smooth(cli::smooth::SmoothArgs),
    /// Print duration and peak joint motion of a trajectory.
    Inspect(cli::inspect::InspectArgs),
}
