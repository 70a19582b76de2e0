use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use tilesmith::config::Config;
use tilesmith::pipeline::{run_build, run_validate};

#[derive(Parser)]
#[command(name = "tilesmith")]
#[command(about = "Offline OSM routing-graph tile builder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the tile store from a PBF extract, then validate it
    Build {
        /// Build configuration (JSON)
        config: PathBuf,
        /// Input OSM PBF extract
        input: PathBuf,
    },
    /// Re-run validation against an existing tile store
    Validate {
        /// Build configuration (JSON)
        config: PathBuf,
    },
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Build { config, input } => {
            let config = Config::from_file(&config)?;
            run_build(&config, &input)
        }
        Commands::Validate { config } => {
            let config = Config::from_file(&config)?;
            run_validate(&config)
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
