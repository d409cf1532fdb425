//! Import/export formats: plain CSV, the application's own SQL dump
//! dialect, and the JSON backup document.

pub mod backup;
pub mod csv;
pub mod sample;
pub mod sql;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("CSV input has no header row")]
    MissingHeader,

    #[error("SQL statement {statement}: {reason}")]
    Sql { statement: usize, reason: String },

    #[error("Invalid backup document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid backup record: {0}")]
    Record(String),
}

impl CodecError {
    pub(crate) fn sql(statement: usize, reason: impl Into<String>) -> Self {
        CodecError::Sql {
            statement,
            reason: reason.into(),
        }
    }
}
