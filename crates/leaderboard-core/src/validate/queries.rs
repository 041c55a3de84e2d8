//! Query list parsing from JSON/YAML.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_queries_schema;

/// Errors that can occur when loading a query list.
#[derive(Error, Debug)]
pub enum QueryFileError {
    #[error("Failed to read queries file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Queries file does not match schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Duplicate query name: {0}")]
    DuplicateName(String),
}

/// A named analytic query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuerySpec {
    /// Display name used in the report
    pub name: String,

    /// SQL text run against the results relation
    pub query: String,
}

impl QuerySpec {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
        }
    }
}

/// Parse a query list from a JSON string.
pub fn queries_from_json(json: &str) -> Result<Vec<QuerySpec>, QueryFileError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    queries_from_value(value)
}

/// Parse a query list from a YAML string.
pub fn queries_from_yaml(yaml: &str) -> Result<Vec<QuerySpec>, QueryFileError> {
    let value: serde_json::Value = serde_yaml::from_str(yaml)?;
    queries_from_value(value)
}

/// Load a query list, choosing the format from the file extension.
///
/// `.yaml` and `.yml` are read as YAML; anything else as JSON.
pub fn load_queries(path: impl AsRef<Path>) -> Result<Vec<QuerySpec>, QueryFileError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
        queries_from_yaml(&contents)
    } else {
        queries_from_json(&contents)
    }
}

fn queries_from_value(value: serde_json::Value) -> Result<Vec<QuerySpec>, QueryFileError> {
    validate_queries_schema(&value).map_err(QueryFileError::SchemaViolation)?;
    let queries: Vec<QuerySpec> = serde_json::from_value(value)?;

    let mut seen = HashSet::new();
    for spec in &queries {
        if !seen.insert(spec.name.as_str()) {
            return Err(QueryFileError::DuplicateName(spec.name.clone()));
        }
    }

    Ok(queries)
}
