//! Error types for doccredit storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed or the backend is unreachable.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Not enough credits or allowance for the debit.
    #[error("insufficient balance: available={available}, required={required}")]
    InsufficientBalance {
        /// Units available.
        available: u64,
        /// Units requested.
        required: u64,
    },

    /// A transaction already exists for this provider session.
    #[error("duplicate provider session: {session_id}")]
    DuplicateSession {
        /// The session (or invoice) id that was already processed.
        session_id: String,
    },

    /// A mutation amount must be positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(u64),
}

impl StoreError {
    /// Whether the error is an infrastructure failure rather than a business outcome.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}
