//! Ledger error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or out-of-range input, rejected before any gateway call.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Loan not found: {loan_id}")]
    NotFound { loan_id: String },

    /// The persistence gateway failed. Never retried by the ledger.
    #[error("Persistence error: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LedgerError {
    pub fn not_found(loan_id: impl Into<String>) -> Self {
        Self::NotFound {
            loan_id: loan_id.into(),
        }
    }

    /// Wrap any storage backend error.
    pub fn persistence<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Persistence(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
