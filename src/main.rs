use anyhow::Result;
use clap::Parser;

use coverage_geo::cli::{Cli, Commands};
use coverage_geo::commands::{compute, run_analytics};

fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Compute(args) => compute(&cli, args),
        Commands::Analytics(args) => run_analytics(&cli, args),
    }
}
