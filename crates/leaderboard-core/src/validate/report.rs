//! Human-readable rendering of validation results.

use std::fmt::Write;

use super::runner::{excerpt, QueryOutcome, QueryReport, QueryStatus};
use super::structure::{expected_shape_example, StructuralReport};
use crate::config::ValidatorConfig;

const RULE: &str = "============================================================";

/// Render the batch of structural errors plus the required document shape.
pub fn render_structural_failure(report: &StructuralReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "✗ Found {} structural error(s) in {} result file(s):",
        report.errors.len(),
        report.files_checked
    );
    for error in &report.errors {
        let _ = writeln!(out, "  - {}", error);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Each result file must look like:");
    for line in expected_shape_example().lines() {
        let _ = writeln!(out, "  {}", line);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Queries were not run.");
    out
}

/// One-line summary of a clean structural pass.
pub fn render_structural_summary(report: &StructuralReport) -> String {
    let roles = if report.participant_keys.is_empty() {
        "none".to_string()
    } else {
        report
            .participant_keys
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "✓ {} result file(s) structurally valid; participant roles found: {}",
        report.files_checked, roles
    )
}

/// Per-query diagnostics: status line, row count, columns and samples.
pub fn render_outcome(outcome: &QueryOutcome, config: &ValidatorConfig) -> String {
    let mut out = String::new();
    match &outcome.status {
        QueryStatus::Passed => {
            let _ = writeln!(out, "✓ {}", outcome.name);
        }
        QueryStatus::Warning(message) => {
            let _ = writeln!(out, "⚠ {}", outcome.name);
            let _ = writeln!(out, "  WARNING: {}", message);
        }
        QueryStatus::Failed(message) => {
            let _ = writeln!(out, "✗ {}: {}", outcome.name, message);
            if outcome.columns.is_empty() {
                return out;
            }
        }
    }

    let _ = writeln!(out, "  Results: {} rows", outcome.row_count);
    let _ = writeln!(out, "  Columns: {}", render_columns(&outcome.columns));
    if !outcome.sample.is_empty() {
        let sample = serde_json::to_string(&outcome.sample).unwrap_or_default();
        let mut shown = excerpt(&sample, config.sample_excerpt_chars);
        if shown.len() < sample.len() {
            shown.push_str("...");
        }
        let _ = writeln!(out, "  Sample: {}", shown);
    }
    out
}

/// Closing summary with counts and the list of problem queries.
pub fn render_summary(report: &QueryReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(
        out,
        "Results: {} passed, {} warnings, {} failed",
        report.passed().count(),
        report.warnings().count(),
        report.failed().count()
    );

    let warnings: Vec<_> = report.warnings().collect();
    if !warnings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "⚠ Queries with warnings (will fail on leaderboard):");
        for outcome in warnings {
            if let QueryStatus::Warning(message) = &outcome.status {
                let _ = writeln!(out, "  - {}: {}", outcome.name, message);
            }
        }
    }

    let failed: Vec<_> = report.failed().collect();
    if !failed.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failed queries:");
        for outcome in failed {
            if let QueryStatus::Failed(message) = &outcome.status {
                let _ = writeln!(out, "  - {}: {}", outcome.name, message);
            }
        }
    }
    out
}

/// Horizontal rule separating report sections.
pub fn rule() -> &'static str {
    RULE
}

fn render_columns(columns: &[String]) -> String {
    serde_json::to_string(columns).unwrap_or_default()
}
