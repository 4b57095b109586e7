use thiserror::Error;

/// Failure of a remote stage call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("network error: {0}")]
    Network(String),
    #[error("{0}")]
    ServerValidation(String),
    #[error("application {0} was not found")]
    NotFound(String),
    #[error("attachment could not be read: {0}")]
    Attachment(String),
    #[error("stage {0} cannot be submitted before the application is created")]
    MissingApplication(u8),
}

impl SubmitError {
    /// Whether re-invoking the same submission may succeed without edits.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Network(_))
    }
}

#[derive(Debug, Error)]
pub enum DraftStoreError {
    #[error("draft storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("draft could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type SubmitResult<T> = Result<T, SubmitError>;
