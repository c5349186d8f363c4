use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("feedback store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::StoreUnavailable(_))
    }
}
