//! Engine error model.

use thiserror::Error;

use stockbook_core::DomainError;

use crate::store::StoreError;

/// Error returned by every engine operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A transaction conflict that persisted through every retry.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("storage error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    State,
    InsufficientStock,
    NotFound,
    TenantMismatch,
    Concurrency,
    Internal,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Domain(DomainError::Validation(_) | DomainError::InvalidId(_)) => {
                ErrorKind::Validation
            }
            EngineError::Domain(DomainError::Conflict(_)) => ErrorKind::Conflict,
            EngineError::Domain(DomainError::InvalidState(_)) => ErrorKind::State,
            EngineError::Domain(DomainError::InsufficientStock { .. }) => {
                ErrorKind::InsufficientStock
            }
            EngineError::Domain(DomainError::NotFound(_)) => ErrorKind::NotFound,
            EngineError::Domain(DomainError::TenantMismatch) => ErrorKind::TenantMismatch,
            EngineError::Concurrency(_) => ErrorKind::Concurrency,
            EngineError::Store(_) | EngineError::Serialization(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, EngineError::Concurrency(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Concurrency(msg) => EngineError::Concurrency(msg),
            StoreError::TenantIsolation(_) => EngineError::Domain(DomainError::TenantMismatch),
            StoreError::Serialization(msg) => EngineError::Serialization(msg),
            StoreError::Backend(msg) => EngineError::Store(msg),
        }
    }
}
