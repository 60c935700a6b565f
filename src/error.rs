use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to create balance record: {0}")]
    RecordCreation(String),

    #[error("Failed to persist balance update: {0}")]
    Persistence(String),

    #[error("Insufficient balance: {balance:.4} credits remaining, next reset at {next_reset}")]
    InsufficientBalance {
        balance:    f64,
        next_reset: DateTime<Utc>,
    },

    #[error("Completion API error: {0}")]
    Completion(String),

    #[error("No pricing entry for model: {0}")]
    UnknownModel(String),

    #[error("Build error: {0}")]
    Build(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Create(msg)  => LedgerError::RecordCreation(msg),
            StoreError::Backend(msg) => LedgerError::Persistence(msg),
        }
    }
}
