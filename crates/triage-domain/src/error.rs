//! Error types for triage fact derivation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed event ({kind}): {detail}")]
    MalformedEvent { kind: String, detail: String },

    #[error("Unknown review state: {state}")]
    UnknownReviewState { state: String },
}

/// Result type for triage operations
pub type Result<T> = std::result::Result<T, TriageError>;
