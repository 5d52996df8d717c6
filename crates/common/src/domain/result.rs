use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid queue payload: {0}")]
    InvalidPayload(String),

    #[error("Queue {0} could not be initialized: {1}")]
    QueueInitialization(String, String),

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Message processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
