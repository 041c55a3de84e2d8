//! Query engine seam.
//!
//! The validator only needs two things from an engine: ingest a set of JSON
//! files as one relation, then run query text against it. `SqliteEngine`
//! provides both over an in-memory SQLite database; nested JSON values are
//! stored as JSON text so they stay reachable through `json_each` and
//! `json_extract`.

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::json_type_name;

/// Errors raised by a query engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "Cannot ingest {}: expected an object or an array of objects, got {found}",
        .path.display()
    )]
    UnsupportedDocument { path: PathBuf, found: &'static str },

    #[error(
        "Cannot ingest {}: keys '{first}' and '{second}' differ only in case",
        .path.display()
    )]
    KeyCollision {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("No fields found in the ingested files")]
    EmptySchema,
}

/// Rows and column names returned by a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Shape of a freshly loaded relation.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub columns: Vec<String>,
    pub rows: usize,
}

/// The narrow contract the validator holds with its query engine.
pub trait QueryEngine {
    /// Ingest `files` into one relation named `table`, inferring its
    /// columns from the union of fields across every record.
    fn load_json_files(&mut self, table: &str, files: &[PathBuf])
        -> Result<TableSummary, EngineError>;

    /// Run query text against the loaded relation.
    fn query(&self, sql: &str) -> Result<QueryOutput, EngineError>;
}

/// In-memory SQLite engine.
pub struct SqliteEngine {
    conn: Connection,
}

impl SqliteEngine {
    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, EngineError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }
}

impl QueryEngine for SqliteEngine {
    fn load_json_files(
        &mut self,
        table: &str,
        files: &[PathBuf],
    ) -> Result<TableSummary, EngineError> {
        let mut records = Vec::new();
        for path in files {
            records.extend(read_records(path)?);
        }

        let schema = UnionSchema::infer(&records);
        if schema.columns.is_empty() {
            return Err(EngineError::EmptySchema);
        }

        let column_list = schema
            .columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=schema.columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "CREATE TABLE {} ({});",
            quote_identifier(table),
            column_list
        ))?;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_identifier(table),
                column_list,
                placeholders
            ))?;
            for record in &records {
                insert.execute(params_from_iter(schema.row(record)))?;
            }
        }
        tx.commit()?;

        // Queries must not be able to alter the loaded data.
        self.conn.execute_batch("PRAGMA query_only=ON;")?;

        debug!(
            table,
            columns = schema.columns.len(),
            rows = records.len(),
            "loaded result table"
        );

        Ok(TableSummary {
            columns: schema.columns,
            rows: records.len(),
        })
    }

    fn query(&self, sql: &str) -> Result<QueryOutput, EngineError> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(json_from_sql(row.get_ref(index)?));
            }
            rows.push(values);
        }

        Ok(QueryOutput { columns, rows })
    }
}

/// Column set inferred from the union of record fields, in first-seen order.
///
/// SQLite column names are case-insensitive, so keys differing only in case
/// share one column.
struct UnionSchema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl UnionSchema {
    fn infer(records: &[Map<String, Value>]) -> Self {
        let mut schema = Self {
            columns: Vec::new(),
            index: HashMap::new(),
        };
        for key in records.iter().flat_map(|r| r.keys()) {
            let folded = key.to_lowercase();
            if !schema.index.contains_key(&folded) {
                schema.index.insert(folded, schema.columns.len());
                schema.columns.push(key.clone());
            }
        }
        schema
    }

    fn row(&self, record: &Map<String, Value>) -> Vec<SqlValue> {
        let mut row = vec![SqlValue::Null; self.columns.len()];
        for (key, value) in record {
            if let Some(&slot) = self.index.get(&key.to_lowercase()) {
                row[slot] = sql_from_json(value);
            }
        }
        row
    }
}

fn read_records(path: &Path) -> Result<Vec<Map<String, Value>>, EngineError> {
    let contents = fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document: Value = serde_json::from_str(&contents).map_err(|source| EngineError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let records = match document {
        Value::Object(record) => vec![record],
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(record) => Ok(record),
                other => Err(EngineError::UnsupportedDocument {
                    path: path.to_path_buf(),
                    found: json_type_name(&other),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => {
            return Err(EngineError::UnsupportedDocument {
                path: path.to_path_buf(),
                found: json_type_name(&other),
            })
        }
    };

    for record in &records {
        check_key_collisions(path, record)?;
    }
    Ok(records)
}

/// Keys that fold to the same column within one record would overwrite
/// each other on insert.
fn check_key_collisions(path: &Path, record: &Map<String, Value>) -> Result<(), EngineError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for key in record.keys() {
        if let Some(first) = seen.insert(key.to_lowercase(), key) {
            return Err(EngineError::KeyCollision {
                path: path.to_path_buf(),
                first: first.to_string(),
                second: key.clone(),
            });
        }
    }
    Ok(())
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_from_json(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        nested => SqlValue::Text(nested.to_string()),
    }
}

fn json_from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}
