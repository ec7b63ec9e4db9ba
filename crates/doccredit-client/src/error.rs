//! Client error types.

/// Errors that can occur when using the doccredit client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// The ledger store is temporarily unavailable.
    #[error("service unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },

    /// Unknown plan, credit package or document type.
    #[error("unknown catalog item: {id}")]
    UnknownCatalogItem {
        /// The identifier that was not found.
        id: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Whether repeating the same request later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Unavailable { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
