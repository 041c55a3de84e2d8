//! Test leaderboard queries against normalized result files.
//!
//! Checks every result file's structure first; queries only run when all
//! files are well formed. The exit status is the number of failed plus
//! warning queries.

use anyhow::{Context, Result};
use clap::Parser;
use leaderboard_cli::init_tracing;
use leaderboard_core::validate::{
    render_outcome, render_structural_failure, render_structural_summary, render_summary, rule,
};
use leaderboard_core::{
    validate, ColumnConvention, ConventionPolicy, SqliteEngine, ValidationOutcome,
    ValidationRequest, ValidatorConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "test-queries")]
#[command(version)]
#[command(
    about = "Test leaderboard queries against result JSON files \
             and validate leaderboard requirements",
    long_about = None
)]
struct Cli {
    /// Path to the queries file (JSON, or YAML by extension)
    #[arg(long, env = "LEADERBOARD_QUERIES", default_value = "tests/queries.json")]
    queries: PathBuf,

    /// Directory containing result JSON files
    #[arg(long, env = "LEADERBOARD_RESULTS_DIR", default_value = "results")]
    results_dir: PathBuf,

    /// Glob selecting result files inside the results directory
    #[arg(long, env = "LEADERBOARD_RESULTS_PATTERN", default_value = "*.json")]
    pattern: String,

    /// Column every query result must lead with
    #[arg(long, default_value = "id")]
    id_column: String,

    /// How to treat queries that break the leading-column rule (warn, fail, ignore)
    #[arg(long, env = "LEADERBOARD_ID_POLICY", default_value = "warn")]
    id_policy: ConventionPolicy,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> ValidatorConfig {
        ValidatorConfig::default()
            .with_pattern(self.pattern.clone())
            .with_convention(ColumnConvention {
                column: self.id_column.clone(),
                policy: self.id_policy,
            })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(?cli, "starting");

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            println!("ERROR: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    println!("Testing queries from {}...", cli.queries.display());
    println!("Against results in {}/", cli.results_dir.display());
    println!("{}", rule());

    let request = ValidationRequest::from_paths(&cli.queries, &cli.results_dir, cli.config())?;
    println!("Loaded {} queries\n", request.queries.len());

    let outcome = validate(&request, SqliteEngine::open_in_memory)
        .with_context(|| format!("validation of {} aborted", cli.results_dir.display()))?;

    match &outcome {
        ValidationOutcome::StructuralFailure(structure) => {
            print!("{}", render_structural_failure(structure));
        }
        ValidationOutcome::Completed { structure, queries } => {
            println!("{}\n", render_structural_summary(structure));
            for query in &queries.outcomes {
                print!("{}", render_outcome(query, &request.config));
            }
            println!();
            print!("{}", render_summary(queries));
        }
    }

    Ok(ExitCode::from(exit_status(&outcome)))
}

fn exit_status(outcome: &ValidationOutcome) -> u8 {
    u8::try_from(outcome.exit_code()).unwrap_or(u8::MAX)
}
