//! End-to-end validation runs over temporary result directories.

use leaderboard_core::validate::{EngineError, QueryOutput, TableSummary};
use leaderboard_core::{
    normalize_file, validate, QueryEngine, QuerySpec, QueryStatus, SqliteEngine,
    StructuralError, ValidateError, ValidationOutcome, ValidationRequest, ValidatorConfig,
};
use serde_json::{json, Value};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Engine that records how often it is touched and answers every query
/// with a single `id` column.
struct CountingEngine<'a> {
    calls: &'a Cell<usize>,
}

impl QueryEngine for CountingEngine<'_> {
    fn load_json_files(
        &mut self,
        _table: &str,
        files: &[PathBuf],
    ) -> Result<TableSummary, EngineError> {
        self.calls.set(self.calls.get() + 1);
        Ok(TableSummary {
            columns: vec!["participants".to_string(), "results".to_string()],
            rows: files.len(),
        })
    }

    fn query(&self, _sql: &str) -> Result<QueryOutput, EngineError> {
        self.calls.set(self.calls.get() + 1);
        Ok(QueryOutput {
            columns: vec!["id".to_string()],
            rows: vec![vec![json!("uuid-1")]],
        })
    }
}

fn results_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

fn write_json(dir: &Path, name: &str, value: &Value) {
    fs::write(dir.join(name), serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn valid_result(role: &str, id: &str, score: i64) -> Value {
    json!({
        "participants": {(role): id},
        "results": [{"agent_name": id, "score": score}]
    })
}

fn request(dir: &Path, queries: Vec<QuerySpec>) -> ValidationRequest {
    ValidationRequest {
        queries,
        results_dir: dir.to_path_buf(),
        config: ValidatorConfig::default(),
    }
}

#[test]
fn empty_results_array_stops_before_queries() {
    let dir = results_dir();
    write_json(dir.path(), "good.json", &valid_result("alice", "uuid-1", 3));
    write_json(
        dir.path(),
        "empty.json",
        &json!({"participants": {"bob": "uuid-2"}, "results": []}),
    );

    let calls = Cell::new(0);
    let opened = Cell::new(0);
    let outcome = validate(
        &request(dir.path(), vec![QuerySpec::new("Any", "SELECT 1 AS id")]),
        || {
            opened.set(opened.get() + 1);
            Ok(CountingEngine { calls: &calls })
        },
    )
    .unwrap();

    let ValidationOutcome::StructuralFailure(report) = &outcome else {
        panic!("expected structural failure, got {:?}", outcome);
    };
    assert_eq!(report.errors.len(), 1);
    let message = report.errors[0].to_string();
    assert!(message.contains("empty.json"));
    assert!(message.contains("empty array"));

    assert_eq!(opened.get(), 0);
    assert_eq!(calls.get(), 0);
    assert_eq!(outcome.exit_code(), 1);
}

#[test]
fn non_array_results_names_actual_type() {
    let dir = results_dir();
    write_json(
        dir.path(),
        "odd.json",
        &json!({"participants": {"a": "1"}, "results": "oops"}),
    );

    let calls = Cell::new(0);
    let outcome = validate(&request(dir.path(), vec![]), || {
        Ok(CountingEngine { calls: &calls })
    })
    .unwrap();

    let ValidationOutcome::StructuralFailure(report) = outcome else {
        panic!("expected structural failure");
    };
    assert_eq!(
        report.errors,
        vec![StructuralError::ResultsNotArray {
            file: "odd.json".to_string(),
            found: "string"
        }]
    );
}

#[test]
fn dotfiles_are_ignored() {
    let dir = results_dir();
    write_json(dir.path(), "run.json", &valid_result("alice", "uuid-1", 3));
    fs::write(dir.path().join(".hidden.json"), "not json at all").unwrap();
    fs::write(dir.path().join(".gitkeep"), "").unwrap();

    let calls = Cell::new(0);
    let outcome = validate(
        &request(dir.path(), vec![QuerySpec::new("Ids", "SELECT 1 AS id")]),
        || Ok(CountingEngine { calls: &calls }),
    )
    .unwrap();

    let ValidationOutcome::Completed { structure, queries } = &outcome else {
        panic!("expected completed run, got {:?}", outcome);
    };
    assert_eq!(structure.files_checked, 1);
    assert_eq!(queries.outcomes.len(), 1);
    assert_eq!(calls.get(), 2);
    assert_eq!(outcome.exit_code(), 0);
}

#[test]
fn stray_non_json_file_is_a_structural_error() {
    let dir = results_dir();
    write_json(dir.path(), "run.json", &valid_result("alice", "uuid-1", 3));
    fs::write(dir.path().join("README.md"), "# results").unwrap();

    let calls = Cell::new(0);
    let outcome = validate(
        &request(dir.path(), vec![QuerySpec::new("Ids", "SELECT 1 AS id")]),
        || Ok(CountingEngine { calls: &calls }),
    )
    .unwrap();

    let ValidationOutcome::StructuralFailure(report) = &outcome else {
        panic!("expected structural failure, got {:?}", outcome);
    };
    assert_eq!(report.files_checked, 2);
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(
        &report.errors[0],
        StructuralError::InvalidJson { file, .. } if file == "README.md"
    ));
    assert_eq!(calls.get(), 0);
    assert_eq!(outcome.exit_code(), 1);
}

#[test]
fn wrong_leading_column_is_a_warning_with_nonzero_exit() {
    let dir = results_dir();
    write_json(dir.path(), "run.json", &valid_result("alice", "uuid-1", 3));

    let outcome = validate(
        &request(
            dir.path(),
            vec![QuerySpec::new("Swapped", "SELECT 5 AS score, 'x' AS id")],
        ),
        SqliteEngine::open_in_memory,
    )
    .unwrap();

    let ValidationOutcome::Completed { queries, .. } = &outcome else {
        panic!("expected completed run");
    };
    assert!(matches!(queries.outcomes[0].status, QueryStatus::Warning(_)));
    assert_eq!(queries.outcomes[0].columns, vec!["score", "id"]);
    assert_eq!(queries.failed().count(), 0);
    assert!(outcome.exit_code() >= 1);
}

#[test]
fn engine_error_is_isolated_to_its_query() {
    let dir = results_dir();
    write_json(dir.path(), "run.json", &valid_result("alice", "uuid-1", 3));

    let queries = vec![
        QuerySpec::new("Broken", "SELECT missing_column FROM results"),
        QuerySpec::new("Count", "SELECT count(*) AS id FROM results"),
        QuerySpec::new("Syntax", "SELEC nothing"),
    ];
    let outcome = validate(&request(dir.path(), queries), SqliteEngine::open_in_memory).unwrap();

    let ValidationOutcome::Completed { queries, .. } = &outcome else {
        panic!("expected completed run");
    };
    assert_eq!(queries.outcomes.len(), 3);
    assert_eq!(queries.failed().count(), 2);
    assert_eq!(queries.outcomes[1].status, QueryStatus::Passed);
    assert_eq!(queries.outcomes[1].sample, vec![vec![json!(1)]]);

    if let QueryStatus::Failed(message) = &queries.outcomes[0].status {
        assert!(message.chars().count() <= 100);
        assert!(message.contains("missing_column"));
    } else {
        panic!("first query should have failed");
    }
    assert_eq!(outcome.exit_code(), 2);
}

#[test]
fn normalized_files_answer_leaderboard_queries() {
    let raw = results_dir();
    let dir = results_dir();

    fs::write(
        raw.path().join("run-1.json"),
        json!({
            "participants": {"red": "uuid-red", "blue": "uuid-blue"},
            "results": [
                {"per_agent": [
                    {"agent_name": "red", "won": true},
                    {"agent_name": "blue", "won": false}
                ]},
                {"per_agent": [
                    {"agent_name": "red", "won": true}
                ]}
            ]
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        raw.path().join("run-2.json"),
        json!({
            "participants": {"red": "uuid-red", "blue": "uuid-blue"},
            "per_agent": [{"agent_name": "blue", "won": true}]
        })
        .to_string(),
    )
    .unwrap();

    assert_eq!(
        normalize_file(raw.path().join("run-1.json"), dir.path().join("run-1.json")).unwrap(),
        3
    );
    assert_eq!(
        normalize_file(raw.path().join("run-2.json"), dir.path().join("run-2.json")).unwrap(),
        1
    );

    let queries = vec![QuerySpec::new(
        "Wins",
        "SELECT json_extract(r.value, '$.agent_name') AS id, \
                sum(json_extract(r.value, '$.won')) AS wins \
         FROM results, json_each(results.results) AS r \
         GROUP BY id ORDER BY id",
    )];
    let outcome = validate(&request(dir.path(), queries), SqliteEngine::open_in_memory).unwrap();

    let ValidationOutcome::Completed { structure, queries } = &outcome else {
        panic!("expected completed run, got {:?}", outcome);
    };
    assert_eq!(
        structure.participant_keys.iter().cloned().collect::<Vec<_>>(),
        vec!["blue".to_string(), "red".to_string()]
    );
    assert_eq!(queries.outcomes[0].status, QueryStatus::Passed);
    assert_eq!(queries.outcomes[0].row_count, 2);
    assert_eq!(
        queries.outcomes[0].sample,
        vec![
            vec![json!("uuid-blue"), json!(1)],
            vec![json!("uuid-red"), json!(2)]
        ]
    );
    assert_eq!(outcome.exit_code(), 0);
}

#[test]
fn custom_pattern_selects_files_to_load() {
    let dir = results_dir();
    write_json(dir.path(), "run-a.json", &valid_result("alice", "uuid-1", 3));
    write_json(dir.path(), "draft.json", &valid_result("bob", "uuid-2", 1));

    let mut req = request(
        dir.path(),
        vec![QuerySpec::new("Rows", "SELECT count(*) AS id FROM results")],
    );
    req.config = ValidatorConfig::default().with_pattern("run-*.json");

    let outcome = validate(&req, SqliteEngine::open_in_memory).unwrap();
    let ValidationOutcome::Completed { structure, queries } = &outcome else {
        panic!("expected completed run, got {:?}", outcome);
    };
    assert_eq!(structure.files_checked, 2);
    assert_eq!(queries.outcomes[0].sample, vec![vec![json!(1)]]);
}

#[test]
fn pattern_does_not_shield_files_from_structure_checks() {
    let dir = results_dir();
    write_json(dir.path(), "run-a.json", &valid_result("alice", "uuid-1", 3));
    write_json(dir.path(), "draft.json", &json!({"results": []}));

    let mut req = request(dir.path(), vec![]);
    req.config = ValidatorConfig::default().with_pattern("run-*.json");

    let outcome = validate(&req, SqliteEngine::open_in_memory).unwrap();
    let ValidationOutcome::StructuralFailure(report) = &outcome else {
        panic!("expected structural failure, got {:?}", outcome);
    };
    assert!(report.errors.iter().all(|e| e.file() == "draft.json"));
}

#[test]
fn empty_directory_is_an_error() {
    let dir = results_dir();
    let result = validate(&request(dir.path(), vec![]), SqliteEngine::open_in_memory);
    assert!(matches!(result, Err(ValidateError::NoResultFiles { .. })));
}

#[test]
fn missing_paths_are_reported() {
    let dir = results_dir();
    let queries = dir.path().join("queries.json");
    fs::write(&queries, r#"[{"name": "One", "query": "SELECT 1 AS id"}]"#).unwrap();

    let missing_queries = ValidationRequest::from_paths(
        dir.path().join("nope.json"),
        dir.path(),
        ValidatorConfig::default(),
    );
    assert!(matches!(missing_queries, Err(ValidateError::QueriesNotFound(_))));

    let missing_dir = ValidationRequest::from_paths(
        &queries,
        dir.path().join("results"),
        ValidatorConfig::default(),
    );
    assert!(matches!(missing_dir, Err(ValidateError::ResultsDirNotFound(_))));

    let ok =
        ValidationRequest::from_paths(&queries, dir.path(), ValidatorConfig::default()).unwrap();
    assert_eq!(ok.queries, vec![QuerySpec::new("One", "SELECT 1 AS id")]);
}
