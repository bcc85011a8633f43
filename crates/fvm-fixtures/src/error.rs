//! Error types for fixture runs

use fvm_repository::RepositoryError;
use thiserror::Error;

/// Fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Fixture field that cannot be turned into a VM input
    #[error("Parse error: {0}")]
    Parse(String),

    /// Repository fault while seeding or inspecting state
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Outcome differs from the expectation
    #[error("Assertion failed: {0}")]
    Assertion(String),
}

/// Fixture result type
pub type FixtureResult<T> = Result<T, FixtureError>;
