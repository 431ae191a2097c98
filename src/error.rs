use thiserror::Error;

/// Per-candidate failure taxonomy for the import pipeline.
///
/// Duplicates are deliberately not represented here: a detected
/// duplicate is a successful no-op outcome, not an error.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Bad sidecar metadata or an unparseable primary file.
    /// Non-retryable; the candidate goes to quarantine as-is.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Filesystem trouble while reading, hashing, or moving.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// Database trouble during the catalog write.
    #[error("database failure: {0}")]
    Db(#[from] sqlx::Error),
}

impl ImportError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ImportError::Validation(msg.into())
    }
}

impl From<crate::puz::PuzError> for ImportError {
    fn from(err: crate::puz::PuzError) -> Self {
        ImportError::Validation(format!("unreadable .puz file: {err}"))
    }
}
