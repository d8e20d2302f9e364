//! Application-wide error types.

use loan_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<ServerError> for LedgerError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Ledger(inner) => inner,
            other => LedgerError::persistence(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
