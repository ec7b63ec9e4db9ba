//! Error types for doccredit.

use crate::ids::IdError;

/// Result type for doccredit core operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur in core ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// A plan id or provider price id is not in the catalog.
    #[error("unknown subscription plan: {0}")]
    UnknownPlan(String),

    /// A credit package id is not in the catalog.
    #[error("unknown credit package: {0}")]
    UnknownPackage(String),

    /// A single-document type is not in the catalog.
    #[error("unknown document type: {0}")]
    UnknownDocument(String),

    /// The catalog itself is malformed.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
