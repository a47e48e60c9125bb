use thiserror::Error;
use uuid::Uuid;

use crate::status::ConsultationStatus;
use crate::store::StoreError;
use crate::tokens::TokenError;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),
    #[error("cannot {action} a consultation that is {current}")]
    InvalidState {
        action: &'static str,
        current: ConsultationStatus,
    },
    #[error("consultation {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("an account with this email already exists")]
    DuplicateAccount,
    #[error("temporarily unavailable: {0}")]
    Transient(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

impl LifecycleError {
    pub fn invalid_state(action: &'static str, current: ConsultationStatus) -> Self {
        LifecycleError::InvalidState { action, current }
    }

    /// Whether the caller may repeat the same call unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LifecycleError::Transient(_))
    }

    /// Maps store failures that carry no action-specific meaning.
    pub(crate) fn from_store(err: StoreError, id: Uuid) -> Self {
        match err {
            StoreError::NotFound => LifecycleError::NotFound(id),
            StoreError::Transient(message) => LifecycleError::Transient(message),
            StoreError::DuplicateEmail => LifecycleError::DuplicateAccount,
            StoreError::TokenConsumed => LifecycleError::Token(TokenError::AlreadyUsed),
            StoreError::TokenMismatch => LifecycleError::Token(TokenError::Mismatch),
            StoreError::TokenExpired => LifecycleError::Token(TokenError::Expired),
            StoreError::StaleState { current } => LifecycleError::InvalidState {
                action: "update",
                current,
            },
            StoreError::Backend(err) => LifecycleError::Internal(err),
        }
    }
}
