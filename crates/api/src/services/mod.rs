//! Engine services: the operations every route handler dispatches into.
//!
//! Pure policy (earning math, capability tables) lives in the domain crate;
//! these services orchestrate repositories and the ledger primitive. Every
//! operation takes the acting principal and an explicit `now` so time-window
//! behavior is deterministic under test.

pub mod events;
pub mod promotions;
pub mod transactions;

use persistence::repositories::LedgerError;
use thiserror::Error;

/// Errors raised by the engine services. All business-rule failures are
/// detected before any mutation is issued; a store-level fault aborts the
/// whole operation with no partial state.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InsufficientBalance(String),

    #[error("{0}")]
    InsufficientBudget(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Gone(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance { .. } => EngineError::InsufficientBalance(
                "Balance is less than the requested amount".to_string(),
            ),
            LedgerError::InsufficientBudget { remain, needed, .. } => {
                EngineError::InsufficientBudget(format!(
                    "Remaining points ({remain}) is less than requested ({needed})"
                ))
            }
            LedgerError::MissingRow => {
                EngineError::NotFound("Referenced resource not found".to_string())
            }
            LedgerError::Db(e) => EngineError::Db(e),
        }
    }
}

impl From<EngineError> for crate::error::ApiError {
    fn from(err: EngineError) -> Self {
        use crate::error::ApiError;
        match err {
            EngineError::Validation(msg) => ApiError::Validation(msg),
            EngineError::InsufficientBalance(msg) => ApiError::InsufficientBalance(msg),
            EngineError::InsufficientBudget(msg) => ApiError::InsufficientBudget(msg),
            EngineError::Conflict(msg) => ApiError::Conflict(msg),
            EngineError::NotFound(msg) => ApiError::NotFound(msg),
            EngineError::Forbidden(msg) => ApiError::Forbidden(msg),
            EngineError::Gone(msg) => ApiError::Gone(msg),
            EngineError::Db(e) => e.into(),
        }
    }
}
