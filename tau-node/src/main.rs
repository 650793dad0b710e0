mod run_simulate;

use crate::run_simulate::*;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tau-node")]
#[command(version, about = "Variational noise precision for matrix factorization")]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate a factor model and recover its noise precision
    Simulate(SimulateArgs),
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match &cli.commands {
        Commands::Simulate(args) => {
            run_simulate(args)?;
        }
    }

    Ok(())
}
