use thiserror::Error;

use tesoro_core::{AuthorizationId, Status, TesoroError};

/// Error type for the authorization engine.
///
/// `InvalidTransition` is reported distinctly from `PermissionDenied` so a
/// client can decide whether a refresh-and-retry makes sense. Raw datastore
/// errors are wrapped, logged by callers, and never shown verbatim to users.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("invalid {field}: {reason}")]
    Validation {
        field: &'static str,
        reason: String,
    },

    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("authorization not found: {0}")]
    NotFound(AuthorizationId),

    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    #[error("repository error: {0}")]
    Repository(String),
}

impl AuthzError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        AuthzError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl From<TesoroError> for AuthzError {
    fn from(e: TesoroError) -> Self {
        AuthzError::Repository(e.to_string())
    }
}

pub type AuthzResult<T> = Result<T, AuthzError>;
