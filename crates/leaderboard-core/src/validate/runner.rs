//! Query execution and classification.
//!
//! Each query is classified independently:
//! 1. Engine error → FAILED
//! 2. Leading-column convention broken → WARNING (or FAILED under the `fail` policy)
//! 3. Otherwise → PASSED
//!
//! A failing query never stops the ones after it.

use serde_json::Value;
use tracing::{debug, warn};

use super::engine::QueryEngine;
use super::queries::QuerySpec;
use crate::config::{ConventionPolicy, ValidatorConfig};

/// Classification of one query run.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryStatus {
    Passed,
    Warning(String),
    Failed(String),
}

/// Everything observed about one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub name: String,
    pub status: QueryStatus,

    /// Rows returned (zero when the query failed to execute)
    pub row_count: usize,

    /// Column names, in result order
    pub columns: Vec<String>,

    /// First few rows, for the report
    pub sample: Vec<Vec<Value>>,
}

/// Outcomes for every query in a run, in query-file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryReport {
    pub outcomes: Vec<QueryOutcome>,
}

impl QueryReport {
    pub fn passed(&self) -> impl Iterator<Item = &QueryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, QueryStatus::Passed))
    }

    pub fn warnings(&self) -> impl Iterator<Item = &QueryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, QueryStatus::Warning(_)))
    }

    pub fn failed(&self) -> impl Iterator<Item = &QueryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, QueryStatus::Failed(_)))
    }

    /// Failed plus warning count.
    pub fn problem_count(&self) -> usize {
        self.warnings().count() + self.failed().count()
    }

    /// Process exit status for this report.
    ///
    /// Equal to `problem_count`, saturated at 255 so large counts cannot
    /// wrap around to a clean status.
    pub fn exit_code(&self) -> i32 {
        self.problem_count().min(255) as i32
    }
}

/// Run every query against the engine and classify the results.
pub fn run_queries<E: QueryEngine + ?Sized>(
    engine: &E,
    queries: &[QuerySpec],
    config: &ValidatorConfig,
) -> QueryReport {
    let outcomes = queries
        .iter()
        .map(|spec| run_query(engine, spec, config))
        .collect();
    QueryReport { outcomes }
}

fn run_query<E: QueryEngine + ?Sized>(
    engine: &E,
    spec: &QuerySpec,
    config: &ValidatorConfig,
) -> QueryOutcome {
    let output = match engine.query(&spec.query) {
        Ok(output) => output,
        Err(e) => {
            let message = excerpt(&e.to_string(), config.error_excerpt_chars);
            warn!(query = %spec.name, error = %message, "query failed");
            return QueryOutcome {
                name: spec.name.clone(),
                status: QueryStatus::Failed(message),
                row_count: 0,
                columns: Vec::new(),
                sample: Vec::new(),
            };
        }
    };

    let convention = &config.id_convention;
    let status = match convention.violation(&output.columns) {
        Some(message) if convention.policy == ConventionPolicy::Fail => {
            QueryStatus::Failed(message)
        }
        Some(message) => QueryStatus::Warning(message),
        None => QueryStatus::Passed,
    };

    debug!(
        query = %spec.name,
        rows = output.rows.len(),
        status = ?status,
        "query executed"
    );

    let row_count = output.rows.len();
    let sample = output.rows.into_iter().take(config.sample_rows).collect();

    QueryOutcome {
        name: spec.name.clone(),
        status,
        row_count,
        columns: output.columns,
        sample,
    }
}

/// Keep at most `max_chars` characters of `text`.
pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
