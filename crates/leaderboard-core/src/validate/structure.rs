//! Structural checks on normalized result documents.
//!
//! Every problem is collected rather than returned early, so one run can
//! report all broken files at once.

use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::json_type_name;

/// A structural problem found in one result file.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("{file}: could not be read: {message}")]
    Unreadable { file: String, message: String },

    #[error("{file}: invalid JSON: {message}")]
    InvalidJson { file: String, message: String },

    #[error("{file}: top-level value must be an object, got {found}")]
    NotAnObject { file: String, found: &'static str },

    #[error("{file}: missing 'participants' key")]
    MissingParticipants { file: String },

    #[error("{file}: 'participants' must be an object, got {found}")]
    ParticipantsNotObject { file: String, found: &'static str },

    #[error("{file}: 'participants' is empty")]
    EmptyParticipants { file: String },

    #[error("{file}: missing 'results' key")]
    MissingResults { file: String },

    #[error("{file}: 'results' must be an array, got {found}")]
    ResultsNotArray { file: String, found: &'static str },

    #[error("{file}: 'results' is an empty array")]
    EmptyResults { file: String },

    #[error("{file}: results[{index}] must be an object, got {found}")]
    RecordNotObject {
        file: String,
        index: usize,
        found: &'static str,
    },

    #[error("{file}: results[{index}] is missing 'agent_name'")]
    MissingAgentName { file: String, index: usize },
}

impl StructuralError {
    /// The file this error was found in.
    pub fn file(&self) -> &str {
        match self {
            Self::Unreadable { file, .. }
            | Self::InvalidJson { file, .. }
            | Self::NotAnObject { file, .. }
            | Self::MissingParticipants { file }
            | Self::ParticipantsNotObject { file, .. }
            | Self::EmptyParticipants { file }
            | Self::MissingResults { file }
            | Self::ResultsNotArray { file, .. }
            | Self::EmptyResults { file }
            | Self::RecordNotObject { file, .. }
            | Self::MissingAgentName { file, .. } => file,
        }
    }
}

/// Outcome of checking every result file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralReport {
    /// Number of files inspected
    pub files_checked: usize,

    /// Every problem, in file order
    pub errors: Vec<StructuralError>,

    /// Participant roles seen across all files
    pub participant_keys: BTreeSet<String>,
}

impl StructuralReport {
    /// True when no file had a structural problem.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check one parsed document.
pub fn check_document(file: &str, document: &Value) -> Vec<StructuralError> {
    let mut errors = Vec::new();
    let file = file.to_string();

    let Some(root) = document.as_object() else {
        errors.push(StructuralError::NotAnObject {
            file,
            found: json_type_name(document),
        });
        return errors;
    };

    match root.get("participants") {
        None => errors.push(StructuralError::MissingParticipants { file: file.clone() }),
        Some(Value::Object(participants)) if participants.is_empty() => {
            errors.push(StructuralError::EmptyParticipants { file: file.clone() })
        }
        Some(Value::Object(_)) => {}
        Some(other) => errors.push(StructuralError::ParticipantsNotObject {
            file: file.clone(),
            found: json_type_name(other),
        }),
    }

    match root.get("results") {
        None => errors.push(StructuralError::MissingResults { file }),
        Some(Value::Array(records)) if records.is_empty() => {
            errors.push(StructuralError::EmptyResults { file })
        }
        Some(Value::Array(records)) => {
            for (index, record) in records.iter().enumerate() {
                match record {
                    Value::Object(fields) if fields.contains_key("agent_name") => {}
                    Value::Object(_) => errors.push(StructuralError::MissingAgentName {
                        file: file.clone(),
                        index,
                    }),
                    other => errors.push(StructuralError::RecordNotObject {
                        file: file.clone(),
                        index,
                        found: json_type_name(other),
                    }),
                }
            }
        }
        Some(other) => errors.push(StructuralError::ResultsNotArray {
            file,
            found: json_type_name(other),
        }),
    }

    errors
}

/// Check every file, collecting errors and participant roles.
pub fn check_files(paths: &[PathBuf]) -> StructuralReport {
    let mut report = StructuralReport::default();

    for path in paths {
        let file = display_name(path);
        report.files_checked += 1;

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                report.errors.push(StructuralError::Unreadable {
                    file,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let document: Value = match serde_json::from_str(&contents) {
            Ok(document) => document,
            Err(e) => {
                report.errors.push(StructuralError::InvalidJson {
                    file,
                    message: e.to_string(),
                });
                continue;
            }
        };

        if let Some(Value::Object(participants)) = document.get("participants") {
            report
                .participant_keys
                .extend(participants.keys().cloned());
        }

        let errors = check_document(&file, &document);
        debug!(file = %file, errors = errors.len(), "checked result file");
        report.errors.extend(errors);
    }

    report
}

/// The document shape every result file must follow, as indented JSON.
pub fn expected_shape_example() -> String {
    let example = json!({
        "participants": {
            "<role>": "<participant-id>"
        },
        "results": [
            {
                "agent_name": "<participant-id>",
                "<metric>": "<value>"
            }
        ]
    });
    serde_json::to_string_pretty(&example).unwrap_or_else(|_| example.to_string())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
