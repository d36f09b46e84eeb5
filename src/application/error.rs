use thiserror::Error;

use crate::domain::{Amount, EntryError, EntryKind, UserId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Also returned for statements owned by someone else, and for empty periods.
    #[error("Statement not found")]
    StatementNotFound,

    #[error("Invalid {0} data: category cannot be empty")]
    EmptyCategory(EntryKind),

    #[error("Invalid {kind} data: amount must be positive, got {amount}")]
    NonPositiveAmount { kind: EntryKind, amount: Amount },

    #[error("Username cannot be empty")]
    InvalidUsername,

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Credential error: {0}")]
    Credentials(anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

/// How a caller should surface an error, independent of transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    InvalidInput,
    Conflict,
    Internal,
}

impl AppError {
    /// Attach the side of the statement a line item was on.
    pub fn from_entry(kind: EntryKind, err: EntryError) -> Self {
        match err {
            EntryError::EmptyCategory => AppError::EmptyCategory(kind),
            EntryError::NonPositiveAmount(amount) => AppError::NonPositiveAmount { kind, amount },
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::UserNotFound(_) | AppError::StatementNotFound => ErrorClass::NotFound,
            AppError::EmptyCategory(_)
            | AppError::NonPositiveAmount { .. }
            | AppError::InvalidUsername => ErrorClass::InvalidInput,
            AppError::UsernameTaken(_) => ErrorClass::Conflict,
            AppError::Credentials(_) | AppError::Database(_) => ErrorClass::Internal,
        }
    }
}
