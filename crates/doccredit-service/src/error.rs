//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use doccredit_core::BillingError;
use doccredit_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Webhook payload failed signature verification.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Checkout referenced a plan, package or document absent from the catalog.
    #[error("unknown plan or package: {0}")]
    UnknownPlanOrPackage(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The ledger store is unreachable; the caller should retry.
    #[error("store unavailable: {0}")]
    TransientStoreFailure(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::InvalidSignature(reason) => {
                tracing::warn!(reason = %reason, "Rejected webhook signature");
                (
                    StatusCode::BAD_REQUEST,
                    "invalid_signature",
                    "Webhook signature verification failed".to_string(),
                    None,
                )
            }
            Self::UnknownPlanOrPackage(id) => (
                StatusCode::BAD_REQUEST,
                "unknown_plan_or_package",
                self.to_string(),
                Some(serde_json::json!({ "id": id })),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::TransientStoreFailure(msg) => {
                tracing::error!(error = %msg, "Ledger store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "The ledger is temporarily unavailable".to_string(),
                    None,
                )
            }
            Self::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                msg.clone(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(msg) => Self::TransientStoreFailure(msg),
            StoreError::NotFound { entity, id } => {
                Self::NotFound(format!("{entity} not found: {id}"))
            }
            StoreError::InvalidAmount(amount) => {
                Self::BadRequest(format!("invalid amount: {amount}"))
            }
            other @ (StoreError::Serialization(_)
            | StoreError::InsufficientBalance { .. }
            | StoreError::DuplicateSession { .. }) => Self::Internal(other.to_string()),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::UnknownPlan(id)
            | BillingError::UnknownPackage(id)
            | BillingError::UnknownDocument(id) => Self::UnknownPlanOrPackage(id),
            BillingError::InvalidId(e) => Self::BadRequest(e.to_string()),
            BillingError::InvalidCatalog(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_status() {
        let cases = [
            (
                ApiError::from(StoreError::Database("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::from(StoreError::NotFound {
                    entity: "subscription",
                    id: "sub_1".into(),
                }),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(StoreError::InvalidAmount(0)),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(StoreError::Serialization("bad cbor".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn unknown_catalog_ids_are_client_errors() {
        let error = ApiError::from(BillingError::UnknownPackage("huge-pack".into()));
        assert!(matches!(error, ApiError::UnknownPlanOrPackage(ref id) if id == "huge-pack"));
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
