//! Flatten nested per-agent results into the normalized document format.
//!
//! Usage:
//!   flatten-results <input.json> <output.json>

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use leaderboard_cli::init_tracing;
use leaderboard_core::normalize_file;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

const USAGE: &str = "Usage: flatten-results <input.json> <output.json>";

#[derive(Parser, Debug)]
#[command(name = "flatten-results")]
#[command(version)]
#[command(about = "Flatten nested per_agent results into a queryable document", long_about = None)]
struct Cli {
    /// Raw result file (wrapped or direct shape)
    input: PathBuf,

    /// Where to write the normalized document
    output: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(_) => {
            println!("{}", USAGE);
            return ExitCode::from(1);
        }
    };

    init_tracing(cli.verbose);
    debug!(?cli, "starting");

    match run(&cli) {
        Ok(count) => {
            println!("Flattened {} agent results", count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<usize> {
    normalize_file(&cli.input, &cli.output)
        .with_context(|| format!("failed to flatten {}", cli.input.display()))
}
