use crate::integrity::ValidationIssue;
use crate::storage::StorageError;

pub type Result<T, E = KanbanError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum KanbanError {
    #[error("Board not found: {0}")]
    BoardNotFound(String),

    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("{message} ({} issue(s))", .errors.len())]
    Validation {
        message: String,
        errors: Vec<ValidationIssue>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Corrupt data under key {key}: {reason}")]
    CorruptData { key: String, reason: String },

    #[error("Storage failure during {operation} for context '{context}': {source}")]
    StorageFailure {
        operation: &'static str,
        context: String,
        #[source]
        source: StorageError,
    },

    #[error("Import of snapshot exported at {snapshot} failed: {source}")]
    ImportFailed {
        snapshot: String,
        #[source]
        source: Box<KanbanError>,
    },

    #[error("Operation '{operation}' failed after {attempts} attempt(s): {source}")]
    OperationFailed {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<KanbanError>,
    },

    #[error("Operation '{operation}' and its fallback both failed: {primary}; fallback: {fallback}")]
    FallbackFailed {
        operation: String,
        primary: Box<KanbanError>,
        #[source]
        fallback: Box<KanbanError>,
    },

    #[error("Circuit '{0}' is open")]
    CircuitOpen(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KanbanError {
    pub(crate) fn validation(message: impl Into<String>, errors: Vec<ValidationIssue>) -> Self {
        Self::Validation {
            message: message.into(),
            errors,
        }
    }

    pub(crate) fn storage(operation: &'static str, context: &str, source: StorageError) -> Self {
        Self::StorageFailure {
            operation,
            context: context.to_string(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BoardNotFound(_) | Self::CardNotFound(_))
    }

    /// Domain errors describe the request itself; repeating the request
    /// cannot change the answer, so wrappers must not retry them.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::BoardNotFound(_)
                | Self::CardNotFound(_)
                | Self::Validation { .. }
                | Self::InvalidArgument(_)
                | Self::InvalidOperation(_)
                | Self::InvalidSnapshot(_)
        )
    }

    pub fn validation_errors(&self) -> &[ValidationIssue] {
        match self {
            Self::Validation { errors, .. } => errors,
            _ => &[],
        }
    }
}
