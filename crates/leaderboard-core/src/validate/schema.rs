//! Query-list schema check.
//!
//! The schema lives in `schemas/queries.schema.json` and is compiled on
//! first use.

use jsonschema::Validator;
use serde_json::Value;
use std::sync::OnceLock;

static QUERIES_SCHEMA: OnceLock<Result<Validator, String>> = OnceLock::new();

fn queries_validator() -> Result<&'static Validator, &'static str> {
    QUERIES_SCHEMA
        .get_or_init(|| {
            let schema: Value =
                serde_json::from_str(include_str!("../../schemas/queries.schema.json"))
                    .map_err(|e| format!("queries schema is not JSON: {}", e))?;
            jsonschema::validator_for(&schema)
                .map_err(|e| format!("queries schema does not compile: {}", e))
        })
        .as_ref()
        .map_err(String::as_str)
}

/// Check a parsed query list.
///
/// Each violation is rendered as `"<message> at <instance path>"`, so a bad
/// entry is identified by its index in the list.
pub fn validate_queries_schema(queries: &Value) -> Result<(), Vec<String>> {
    let validator = queries_validator().map_err(|e| vec![e.to_string()])?;

    let violations: Vec<String> = validator
        .iter_errors(queries)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}
