use tesoro_core::TesoroError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl From<TesoroError> for NotifyError {
    fn from(err: TesoroError) -> Self {
        match err {
            TesoroError::Serialization(msg) => NotifyError::Serialization(msg),
            TesoroError::Storage(msg) => NotifyError::Storage(msg),
            other => NotifyError::Storage(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for NotifyError {
    fn from(err: serde_json::Error) -> Self {
        NotifyError::Serialization(err.to_string())
    }
}

pub type NotifyResult<T> = Result<T, NotifyError>;
