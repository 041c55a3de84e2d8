//! Flattening of nested evaluation results.
//!
//! Raw result documents arrive in one of two shapes:
//!
//! - **Wrapped**: `{"results": [{"per_agent": [...]}, ...]}`
//! - **Direct**: `{"per_agent": [...]}`
//!
//! The shape is resolved once, when the document is parsed. Normalizing
//! concatenates every agent record into a single `results` array and swaps
//! each `agent_name` for its participant identifier when one is known.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::json_type_name;

/// Mapping from role/agent name to an opaque participant identifier.
pub type Participants = Map<String, Value>;

/// Errors that can occur while normalizing a result document.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Failed to access result file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed input JSON: {0}")]
    MalformedInput(#[source] serde_json::Error),

    #[error("Expected a JSON object at the top level, found {found}")]
    NotAnObject { found: &'static str },

    #[error("Failed to serialize normalized document: {0}")]
    SerializeError(#[source] serde_json::Error),
}

/// One element of a wrapped `results` array.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Wrapper {
    /// Agent records grouped under this wrapper
    pub per_agent: Vec<Value>,
}

impl Wrapper {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut fields) => match fields.remove("per_agent") {
                Some(Value::Array(per_agent)) => Self { per_agent },
                Some(other) => {
                    warn!(found = json_type_name(&other), "wrapper per_agent is not an array");
                    Self::default()
                }
                None => Self::default(),
            },
            other => {
                debug!(found = json_type_name(&other), "skipping non-object wrapper");
                Self::default()
            }
        }
    }
}

/// Where the agent records live in a raw document.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultShape {
    /// `results[*].per_agent[*]`
    Wrapped(Vec<Wrapper>),

    /// `per_agent[*]`
    Direct(Vec<Value>),

    /// Neither field present
    Empty,
}

impl ResultShape {
    fn resolve(root: &mut Map<String, Value>) -> Self {
        if matches!(root.get("results"), Some(Value::Array(_))) {
            if let Some(Value::Array(wrappers)) = root.remove("results") {
                return Self::Wrapped(wrappers.into_iter().map(Wrapper::from_value).collect());
            }
        }

        match root.remove("per_agent") {
            Some(Value::Array(records)) => Self::Direct(records),
            Some(other) => {
                warn!(found = json_type_name(&other), "per_agent is not an array");
                Self::Empty
            }
            None => Self::Empty,
        }
    }

    /// Total number of agent records across the shape.
    pub fn record_count(&self) -> usize {
        match self {
            Self::Wrapped(wrappers) => wrappers.iter().map(|w| w.per_agent.len()).sum(),
            Self::Direct(records) => records.len(),
            Self::Empty => 0,
        }
    }

    /// Concatenate records in wrapper order, then within-wrapper order.
    pub fn flatten(self) -> Vec<Value> {
        match self {
            Self::Wrapped(wrappers) => wrappers.into_iter().flat_map(|w| w.per_agent).collect(),
            Self::Direct(records) => records,
            Self::Empty => Vec::new(),
        }
    }
}

/// A parsed raw result document.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub participants: Participants,
    pub shape: ResultShape,
}

impl RawDocument {
    /// Parse a raw document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, NormalizeError> {
        let value: Value = serde_json::from_str(json).map_err(NormalizeError::MalformedInput)?;
        Self::from_value(value)
    }

    /// Resolve the document shape from an already parsed value.
    pub fn from_value(value: Value) -> Result<Self, NormalizeError> {
        let mut root = match value {
            Value::Object(root) => root,
            other => {
                return Err(NormalizeError::NotAnObject {
                    found: json_type_name(&other),
                })
            }
        };

        let participants = match root.remove("participants") {
            Some(Value::Object(participants)) => participants,
            Some(other) => {
                warn!(found = json_type_name(&other), "ignoring non-object participants");
                Participants::new()
            }
            None => Participants::new(),
        };

        let shape = ResultShape::resolve(&mut root);
        Ok(Self {
            participants,
            shape,
        })
    }

    /// Flatten the records and substitute participant identifiers.
    pub fn normalize(self) -> NormalizedDocument {
        let Self {
            participants,
            shape,
        } = self;

        let mut results = shape.flatten();
        let renamed = results
            .iter_mut()
            .map(|record| substitute_agent_name(record, &participants))
            .filter(|renamed| *renamed)
            .count();

        info!(records = results.len(), renamed, "flattened agent results");

        NormalizedDocument {
            participants,
            results,
        }
    }
}

/// Replace a record's `agent_name` with its participant identifier.
///
/// Returns true when a substitution happened. Records without a string
/// `agent_name`, or whose name is not a participant key, are left alone.
pub fn substitute_agent_name(record: &mut Value, participants: &Participants) -> bool {
    let Some(slot) = record.get_mut("agent_name") else {
        return false;
    };
    let Some(identifier) = slot.as_str().and_then(|name| participants.get(name)) else {
        return false;
    };
    *slot = identifier.clone();
    true
}

/// The flat document the validator and query engine consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub participants: Participants,
    pub results: Vec<Value>,
}

impl NormalizedDocument {
    /// Render as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, NormalizeError> {
        serde_json::to_string_pretty(self).map_err(NormalizeError::SerializeError)
    }
}

/// Parse and normalize a raw document in one step.
pub fn normalize_str(json: &str) -> Result<NormalizedDocument, NormalizeError> {
    Ok(RawDocument::from_json(json)?.normalize())
}

/// Normalize `input` and write the result to `output`.
///
/// Nothing is written when the input cannot be parsed. Returns the number
/// of flattened records.
pub fn normalize_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<usize, NormalizeError> {
    let contents = fs::read_to_string(input.as_ref())?;
    let document = normalize_str(&contents)?;
    let rendered = document.to_json_pretty()?;
    fs::write(output.as_ref(), rendered + "\n")?;
    debug!(output = %output.as_ref().display(), "wrote normalized document");
    Ok(document.results.len())
}
