use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("No index available: ingest documents or load an existing index first")]
    NoIndexAvailable,

    #[error("No relevant context found for query")]
    NoRelevantContext,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },
}

/// Coarse classification handed to callers alongside the message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    InvalidConfig,
    ModelUnavailable,
    GenerationError,
    NoIndexAvailable,
    NoRelevantContext,
    NotFound,
    PersistenceFailure,
    Timeout,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Error::Generation(_) => ErrorKind::GenerationError,
            Error::NoIndexAvailable => ErrorKind::NoIndexAvailable,
            Error::NoRelevantContext => ErrorKind::NoRelevantContext,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Persistence(_) => ErrorKind::PersistenceFailure,
            Error::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// True when the same request may succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ModelUnavailable(_)
                | Error::Generation(_)
                | Error::NoIndexAvailable
                | Error::Persistence(_)
                | Error::Timeout { .. }
        )
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport { kind: self.kind(), message: self.to_string(), retryable: self.is_retryable() }
    }
}

/// Serialisable view of an [`Error`] for user-facing responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

pub type Result<T> = std::result::Result<T, Error>;
