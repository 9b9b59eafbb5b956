use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Decoded global identifier names a different type than the guarded table.
    #[error("Mismatched type: expected '{expected}', got '{actual}'")]
    MismatchedNodeType { expected: String, actual: String },

    /// Decoded global identifier carries the wrong number of key parts.
    #[error("Invalid identifier: {0}")]
    InvalidNodeId(String),

    #[error("Mutation blocked due to conflict: {0}")]
    Conflict(String),

    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Transaction {0} is no longer active")]
    TransactionClosed(u64),

    #[error("Schema conflict: {0}")]
    SchemaConflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

/// Coarse classification of a [`DbError`], for callers that branch on the
/// failure class rather than on the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is malformed; resubmitting it unchanged fails again.
    RequestValidation,
    /// The row moved on (or vanished) since the client read it.
    Conflict,
    /// Lock acquisition or the backing store failed.
    Transport,
    /// Host misconfiguration or an invalid schema build.
    Configuration,
    Execution,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::RequestValidation => "request_validation",
            Self::Conflict => "conflict",
            Self::Transport => "transport",
            Self::Configuration => "configuration",
            Self::Execution => "execution",
        };
        write!(f, "{label}")
    }
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ParseError(_)
            | Self::TypeMismatch(_)
            | Self::InvalidInput(_)
            | Self::ConstraintViolation(_)
            | Self::MismatchedNodeType { .. }
            | Self::InvalidNodeId(_) => ErrorKind::RequestValidation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::LockTimeout(_) | Self::LockError(_) | Self::TransactionClosed(_) => {
                ErrorKind::Transport
            }
            Self::TableNotFound(_)
            | Self::ColumnNotFound(_, _)
            | Self::SchemaConflict(_)
            | Self::Config(_) => ErrorKind::Configuration,
            Self::ExecutionError(_) => ErrorKind::Execution,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}
