//! Doccredit HTTP client implementation.

use reqwest::{Client, RequestBuilder};
use std::time::Duration;

use doccredit_core::UserId;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, CheckoutSession, DocumentsResponse, GenerationPermit, LedgerSummary,
    PaymentVerification, PermitRequest, TransactionsPage,
};

/// Doccredit API client.
///
/// Service calls (the generation permit) authenticate with the API key the
/// client was built with; user calls take the user's JWT per request.
#[derive(Debug, Clone)]
pub struct DocCreditClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_name: String,
}

impl DocCreditClient {
    /// Create a new doccredit client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the doccredit service (e.g., `"http://doccredit:8080"`)
    /// * `api_key` - Service API key for authentication
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new doccredit client with custom options.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            service_name: options.service_name,
        })
    }

    /// Request a generation permit for `user_id`.
    ///
    /// A permit means one unit is already consumed. Retrying with the same
    /// `idempotency_key` returns the same permit without consuming again.
    /// Denials are returned as `Ok` with `permit == false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn request_generation(
        &self,
        user_id: &UserId,
        idempotency_key: impl Into<String>,
    ) -> Result<GenerationPermit, ClientError> {
        let request = PermitRequest {
            user_id: user_id.to_string(),
            idempotency_key: idempotency_key.into(),
        };

        let response = self
            .service_request(self.client.post(self.url("/v1/generation/permit")))
            .json(&request)
            .send()
            .await?;

        let permit: GenerationPermit = self.handle_response(response).await?;
        if !permit.permit {
            tracing::debug!(
                user_id = %user_id,
                idempotency_key = %request.idempotency_key,
                reason = ?permit.reason,
                "Generation permit denied"
            );
        }
        Ok(permit)
    }

    /// Get the user's credits, active subscription and entitlement.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_ledger(&self, user_jwt: &str) -> Result<LedgerSummary, ClientError> {
        let response = self
            .client
            .get(self.url("/v1/ledger"))
            .bearer_auth(user_jwt)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List the user's audit transactions.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_transactions(
        &self,
        user_jwt: &str,
        limit: usize,
        offset: usize,
    ) -> Result<TransactionsPage, ClientError> {
        let response = self
            .client
            .get(self.url("/v1/transactions"))
            .bearer_auth(user_jwt)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List the user's single-document purchases.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_documents(&self, user_jwt: &str) -> Result<DocumentsResponse, ClientError> {
        let response = self
            .client
            .get(self.url("/v1/documents"))
            .bearer_auth(user_jwt)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Start a subscription checkout for a catalog plan.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::UnknownCatalogItem` for an unknown plan.
    pub async fn checkout_subscription(
        &self,
        user_jwt: &str,
        plan_id: &str,
    ) -> Result<CheckoutSession, ClientError> {
        self.checkout(user_jwt, "subscription", serde_json::json!({ "plan_id": plan_id }))
            .await
    }

    /// Start a checkout for a credit package.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::UnknownCatalogItem` for an unknown package.
    pub async fn checkout_credits(
        &self,
        user_jwt: &str,
        package_id: &str,
    ) -> Result<CheckoutSession, ClientError> {
        self.checkout(user_jwt, "credits", serde_json::json!({ "package_id": package_id }))
            .await
    }

    /// Start a checkout for a single document.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::UnknownCatalogItem` for an unknown document type.
    pub async fn checkout_document(
        &self,
        user_jwt: &str,
        document_type: &str,
    ) -> Result<CheckoutSession, ClientError> {
        self.checkout(
            user_jwt,
            "document",
            serde_json::json!({ "document_type": document_type }),
        )
        .await
    }

    /// Confirm a checkout after the Stripe redirect.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn verify_payment(
        &self,
        user_jwt: &str,
        session_id: &str,
    ) -> Result<PaymentVerification, ClientError> {
        let response = self
            .client
            .post(self.url("/v1/payments/verify"))
            .bearer_auth(user_jwt)
            .json(&serde_json::json!({ "session_id": session_id }))
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn checkout(
        &self,
        user_jwt: &str,
        kind: &str,
        body: serde_json::Value,
    ) -> Result<CheckoutSession, ClientError> {
        let response = self
            .client
            .post(self.url(&format!("/v1/checkout/{kind}")))
            .bearer_auth(user_jwt)
            .json(&body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn service_request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            return Ok(serde_json::from_slice(&body)?);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let code = api_error.error.code.as_str();
                let message = api_error.error.message;

                match code {
                    "store_unavailable" => Err(ClientError::Unavailable { message }),
                    "unknown_plan_or_package" => {
                        let id = api_error
                            .error
                            .details
                            .as_ref()
                            .and_then(|d| d.get("id"))
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        Err(ClientError::UnknownCatalogItem { id })
                    }
                    _ => Err(ClientError::Api {
                        code: code.to_string(),
                        message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Service name to include in requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a service name.
    #[must_use]
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = DocCreditClient::new("http://localhost:8080/", "test-api-key").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
        assert_eq!(client.url("/v1/ledger"), "http://localhost:8080/v1/ledger");
    }

    #[test]
    fn client_options() {
        let options = ClientOptions::with_service_name("doc-generator");
        let client =
            DocCreditClient::with_options("http://localhost:8080", "key", options).unwrap();
        assert_eq!(client.service_name, "doc-generator");
    }
}
