use scoring_module::ScoringError;

use crate::document_store::StoreError;
use crate::scheduler::JobStoreError;

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("invalid timestamp {input:?}: {source}")]
    InvalidTime {
        input: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("timestamp {input:?} is outside the supported range")]
    TimeOutOfRange { input: String },
    #[error(transparent)]
    Job(#[from] JobStoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("embedding rejected: {0}")]
    Embedding(#[from] ScoringError),
    #[error("malformed {field} on document: {reason}")]
    MalformedField { field: &'static str, reason: String },
    #[error("suggestion payload is not valid JSON: {0}")]
    Suggestion(#[from] serde_json::Error),
}
