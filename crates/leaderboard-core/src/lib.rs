//! # leaderboard-core
//!
//! Result normalization and query validation for leaderboard pipelines.
//!
//! This crate answers two questions about evaluation results:
//! - What do the per-agent records look like once flattened?
//! - Will the leaderboard's queries run cleanly against them?
//!
//! ## Example
//!
//! ```rust,ignore
//! use leaderboard_core::{
//!     normalize_file, validate, SqliteEngine, ValidationRequest, ValidatorConfig,
//! };
//!
//! let count = normalize_file("raw/run-1.json", "results/run-1.json")?;
//! println!("Flattened {} agent results", count);
//!
//! let request =
//!     ValidationRequest::from_paths("tests/queries.json", "results", ValidatorConfig::default())?;
//! let outcome = validate(&request, SqliteEngine::open_in_memory)?;
//! std::process::exit(outcome.exit_code());
//! ```

pub mod config;
pub mod normalize;
pub mod validate;

// Re-export main types at crate root
pub use config::{ColumnConvention, ConventionPolicy, ValidatorConfig};
pub use normalize::{
    normalize_file, normalize_str, NormalizeError, NormalizedDocument, Participants, RawDocument,
    ResultShape, Wrapper,
};
pub use validate::{
    collect_result_files, collect_visible_files, load_queries, run_queries, validate, QueryEngine,
    QueryOutcome, QueryReport, QuerySpec, QueryStatus, SqliteEngine, StructuralError,
    StructuralReport, ValidateError, ValidationOutcome, ValidationRequest,
};

use serde_json::Value;

/// JSON type name of a value, as used in error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
