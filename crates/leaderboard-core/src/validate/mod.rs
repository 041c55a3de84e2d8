//! Result-file validation and query testing.
//!
//! A run has two phases:
//!
//! 1. **Structure**: every non-hidden file in the results directory is
//!    checked for the normalized shape. All problems are collected; any
//!    problem ends the run here.
//! 2. **Queries**: the files matching the results pattern are loaded into
//!    one relation and every query is run and classified.
//!
//! The engine is only opened once phase 1 is clean.

mod engine;
mod queries;
mod report;
mod runner;
mod schema;
mod structure;

pub use engine::{EngineError, QueryEngine, QueryOutput, SqliteEngine, TableSummary};
pub use queries::{load_queries, queries_from_json, queries_from_yaml, QueryFileError, QuerySpec};
pub use report::{
    render_outcome, render_structural_failure, render_structural_summary, render_summary, rule,
};
pub use runner::{run_queries, QueryOutcome, QueryReport, QueryStatus};
pub use schema::validate_queries_schema;
pub use structure::{
    check_document, check_files, expected_shape_example, StructuralError, StructuralReport,
};

use globset::Glob;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ValidatorConfig;

/// Errors that end a validation run early.
#[derive(Error, Debug)]
pub enum ValidateError {
    #[error("Queries file not found: {}", .0.display())]
    QueriesNotFound(PathBuf),

    #[error("Results directory not found: {}", .0.display())]
    ResultsDirNotFound(PathBuf),

    #[error("No result files matching '{pattern}' in {}", .dir.display())]
    NoResultFiles { dir: PathBuf, pattern: String },

    #[error("Invalid results pattern: {0}")]
    InvalidPattern(#[from] globset::Error),

    #[error("Failed to list results directory: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    QueryFile(#[from] QueryFileError),

    #[error("Query engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Inputs for one validation run.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub queries: Vec<QuerySpec>,
    pub results_dir: PathBuf,
    pub config: ValidatorConfig,
}

impl ValidationRequest {
    /// Build a request from on-disk paths, checking that both exist.
    pub fn from_paths(
        queries_path: impl AsRef<Path>,
        results_dir: impl AsRef<Path>,
        config: ValidatorConfig,
    ) -> Result<Self, ValidateError> {
        let queries_path = queries_path.as_ref();
        let results_dir = results_dir.as_ref();

        if !queries_path.exists() {
            return Err(ValidateError::QueriesNotFound(queries_path.to_path_buf()));
        }
        if !results_dir.is_dir() {
            return Err(ValidateError::ResultsDirNotFound(results_dir.to_path_buf()));
        }

        Ok(Self {
            queries: load_queries(queries_path)?,
            results_dir: results_dir.to_path_buf(),
            config,
        })
    }
}

/// How a validation run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Phase 1 found problems; no query was run
    StructuralFailure(StructuralReport),

    /// Both phases ran
    Completed {
        structure: StructuralReport,
        queries: QueryReport,
    },
}

impl ValidationOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StructuralFailure(_) => 1,
            Self::Completed { queries, .. } => queries.exit_code(),
        }
    }
}

/// List every non-hidden regular file in `dir`, sorted.
///
/// Phase 1 checks all of these, whatever their extension.
pub fn collect_visible_files(dir: &Path) -> Result<Vec<PathBuf>, ValidateError> {
    if !dir.is_dir() {
        return Err(ValidateError::ResultsDirNotFound(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') || !path.is_file() {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// List the non-hidden files in `dir` whose names match `pattern`.
pub fn collect_result_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, ValidateError> {
    let matcher = Glob::new(pattern)?.compile_matcher();
    Ok(collect_visible_files(dir)?
        .into_iter()
        .filter(|path| path.file_name().is_some_and(|name| matcher.is_match(name)))
        .collect())
}

/// Run both validation phases.
///
/// `open_engine` is only called when phase 1 is clean, and the engine is
/// dropped before this returns.
pub fn validate<E, F>(
    request: &ValidationRequest,
    open_engine: F,
) -> Result<ValidationOutcome, ValidateError>
where
    E: QueryEngine,
    F: FnOnce() -> Result<E, EngineError>,
{
    let config = &request.config;
    let no_files = || ValidateError::NoResultFiles {
        dir: request.results_dir.clone(),
        pattern: config.results_pattern.clone(),
    };

    let candidates = collect_visible_files(&request.results_dir)?;
    if candidates.is_empty() {
        return Err(no_files());
    }

    let structure = check_files(&candidates);
    if !structure.is_clean() {
        warn!(
            errors = structure.errors.len(),
            "structural validation failed, skipping queries"
        );
        return Ok(ValidationOutcome::StructuralFailure(structure));
    }

    let files = collect_result_files(&request.results_dir, &config.results_pattern)?;
    if files.is_empty() {
        return Err(no_files());
    }

    let mut engine = open_engine()?;
    let table = engine.load_json_files(&config.table_name, &files)?;
    info!(
        files = files.len(),
        rows = table.rows,
        columns = table.columns.len(),
        "loaded results"
    );

    let queries = run_queries(&engine, &request.queries, config);
    info!(
        queries = queries.outcomes.len(),
        problems = queries.problem_count(),
        "queries complete"
    );

    Ok(ValidationOutcome::Completed { structure, queries })
}
