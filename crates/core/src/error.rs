//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. None of these
/// are retried: they describe bad input or stale client state and are surfaced
/// verbatim. Storage and concurrency failures live in the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad input (non-positive quantity/price, missing warehouse, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request collides with existing data (duplicate line, duplicate
    /// serial, serial reserved elsewhere, stock type locked).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation is illegal for the current order/unit status.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Less stock is available than the operation requires.
    #[error("insufficient stock for {subject}: requested {requested}, available {available}")]
    InsufficientStock {
        subject: String,
        requested: i64,
        available: i64,
    },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced entity does not exist for the caller's tenant.
    #[error("{0} not found")]
    NotFound(String),

    /// A loaded entity belongs to a different tenant than the caller.
    #[error("tenant mismatch")]
    TenantMismatch,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn insufficient_stock(subject: impl Into<String>, requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            subject: subject.into(),
            requested,
            available,
        }
    }
}
