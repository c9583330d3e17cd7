use thiserror::Error;

#[derive(Debug, Error)]
pub enum TesoroError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for TesoroError {
    fn from(e: serde_json::Error) -> Self {
        TesoroError::Serialization(e.to_string())
    }
}

pub type TesoroResult<T> = Result<T, TesoroError>;
