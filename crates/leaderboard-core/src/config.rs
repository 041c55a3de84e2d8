//! Validator configuration.

use std::fmt;
use std::str::FromStr;

/// What to do when a query breaks the leading-column convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConventionPolicy {
    /// Report a warning; the query still counts toward the exit status
    #[default]
    Warn,

    /// Treat the query as failed
    Fail,

    /// Do not check the convention
    Ignore,
}

impl FromStr for ConventionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "warn" | "warning" => Ok(Self::Warn),
            "fail" | "error" => Ok(Self::Fail),
            "ignore" | "off" => Ok(Self::Ignore),
            other => Err(format!(
                "unknown convention policy '{}' (expected warn, fail or ignore)",
                other
            )),
        }
    }
}

impl fmt::Display for ConventionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Ignore => "ignore",
        };
        f.write_str(name)
    }
}

/// The leaderboard requires every query result to lead with a given column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnConvention {
    /// Required name of the first result column
    pub column: String,

    /// How violations are classified
    pub policy: ConventionPolicy,
}

impl Default for ColumnConvention {
    fn default() -> Self {
        Self {
            column: "id".to_string(),
            policy: ConventionPolicy::Warn,
        }
    }
}

impl ColumnConvention {
    /// Describe how `columns` violate the convention, if they do.
    ///
    /// An empty column list is not a violation.
    pub fn violation(&self, columns: &[String]) -> Option<String> {
        if self.policy == ConventionPolicy::Ignore {
            return None;
        }
        match columns.first() {
            Some(first) if *first != self.column => Some(format!(
                "First column is '{}', but '{}' must be the first column",
                first, self.column
            )),
            _ => None,
        }
    }
}

/// Settings for a validation run.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Glob (relative to the results directory) selecting result files
    pub results_pattern: String,

    /// Name of the relation queries run against
    pub table_name: String,

    /// Leading-column convention
    pub id_convention: ColumnConvention,

    /// Sample rows printed per query
    pub sample_rows: usize,

    /// Characters of an engine error kept in the report
    pub error_excerpt_chars: usize,

    /// Characters of the sample-row rendering kept in the report
    pub sample_excerpt_chars: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            results_pattern: "*.json".to_string(),
            table_name: "results".to_string(),
            id_convention: ColumnConvention::default(),
            sample_rows: 2,
            error_excerpt_chars: 100,
            sample_excerpt_chars: 200,
        }
    }
}

impl ValidatorConfig {
    /// Use a different result-file glob.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.results_pattern = pattern.into();
        self
    }

    /// Use a different leading-column convention.
    pub fn with_convention(mut self, convention: ColumnConvention) -> Self {
        self.id_convention = convention;
        self
    }
}
