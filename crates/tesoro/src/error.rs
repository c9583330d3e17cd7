use thiserror::Error;

/// Error type for the tesoro orchestration layer, aggregating errors from
/// the workspace crates.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("authorization error: {0}")]
    Authz(#[from] tesoro_authz::AuthzError),

    #[error("notification error: {0}")]
    Notify(#[from] tesoro_notify::NotifyError),

    #[error("storage error: {0}")]
    Storage(#[from] tesoro_core::TesoroError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
