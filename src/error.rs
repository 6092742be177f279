use thiserror::Error;

use crate::validation::ValidationIssue;

/// Raised by the statement engine when its inputs cannot produce a sound statement.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("card settings rejected: {}", summarize(.0))]
    Validation(Vec<ValidationIssue>),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
