
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConceptError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Content not valid for concept class {class}: {message}")]
    ContentInvalid { class: String, message: String },
    #[error("Connections not valid for concept class {class}: {message}")]
    ConnectionsNotValid { class: String, message: String },
    #[error("Distinct connection violation for predicate {predicate}: found {found} matches")]
    DistinctConnection { predicate: String, found: usize },
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize> },
    #[error("Not representable as triple text: {0}")]
    Unrepresentable(String),
    #[error("Identity collision: {0}")]
    Collision(String),
    #[error("Round-trip verification failed: {0}")]
    Verification(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, ConceptError>;

impl ConceptError {
    /// A distinct connection violation is a special case of connections-not-valid,
    /// so both answer true when a caller only cares about the shape of the failure.
    pub fn is_connections_not_valid(&self) -> bool {
        matches!(
            self,
            ConceptError::ConnectionsNotValid { .. } | ConceptError::DistinctConnection { .. }
        )
    }
}
