//! Stripe API client implementation.

use reqwest::Client;
use std::time::Duration;

use doccredit_core::BillingInterval;

use super::types::{CheckoutSession, StripeErrorResponse, StripeSubscription};

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
        /// HTTP status.
        status: u16,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StripeError {
    /// Whether Stripe reported the object as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
            || matches!(self, Self::Api { code: Some(code), .. } if code == "resource_missing")
    }
}

/// Checkout session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    /// One-off payment (credits, single documents).
    Payment,
    /// Recurring plan.
    Subscription,
}

impl CheckoutMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Subscription => "subscription",
        }
    }
}

/// What the checkout charges for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItem {
    /// A price configured in Stripe.
    Price {
        /// Stripe price id.
        price_id: String,
    },
    /// Inline price data.
    Inline {
        /// Three-letter currency code.
        currency: String,
        /// Product name shown at checkout.
        name: String,
        /// Product description.
        description: Option<String>,
        /// Unit amount in minor units.
        unit_amount: i64,
        /// Billing interval for subscriptions.
        recurring: Option<BillingInterval>,
    },
}

/// Parameters for a new Checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Session mode.
    pub mode: CheckoutMode,
    /// Paying user, sent as `client_reference_id`.
    pub user_id: String,
    /// The single line item.
    pub line_item: LineItem,
    /// Metadata copied onto the session (and the subscription, in subscription mode).
    pub metadata: Vec<(String, String)>,
    /// Redirect on success.
    pub success_url: String,
    /// Redirect on cancel.
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// Encode as Stripe form parameters.
    #[must_use]
    pub fn form_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("mode".to_string(), self.mode.as_str().to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("client_reference_id".to_string(), self.user_id.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
        ];

        match &self.line_item {
            LineItem::Price { price_id } => {
                params.push(("line_items[0][price]".to_string(), price_id.clone()));
            }
            LineItem::Inline {
                currency,
                name,
                description,
                unit_amount,
                recurring,
            } => {
                let prefix = "line_items[0][price_data]";
                params.push((format!("{prefix}[currency]"), currency.clone()));
                params.push((format!("{prefix}[product_data][name]"), name.clone()));
                if let Some(description) = description {
                    params.push((
                        format!("{prefix}[product_data][description]"),
                        description.clone(),
                    ));
                }
                params.push((format!("{prefix}[unit_amount]"), unit_amount.to_string()));
                if let Some(interval) = recurring {
                    params.push((
                        format!("{prefix}[recurring][interval]"),
                        interval.as_str().to_string(),
                    ));
                }
            }
        }

        for (key, value) in &self.metadata {
            params.push((format!("metadata[{key}]"), value.clone()));
            if self.mode == CheckoutMode::Subscription {
                params.push((format!("subscription_data[metadata][{key}]"), value.clone()));
            }
        }

        params
    }
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Configuration` if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, StripeError> {
        Self::with_base_url(api_key, Self::BASE_URL)
    }

    /// Create a client against a different API root (e.g. a mock server).
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Configuration` if the HTTP client cannot be built.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, StripeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StripeError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a Checkout session.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        tracing::debug!(
            user_id = %request.user_id,
            mode = request.mode.as_str(),
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&request.form_params())
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Retrieve a Checkout session, with its subscription expanded.
    pub async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let response = self
            .client
            .get(format!("{}/checkout/sessions/{}", self.base_url, session_id))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .query(&[("expand[]", "subscription")])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Retrieve a subscription.
    pub async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, StripeError> {
        let response = self
            .client
            .get(format!("{}/subscriptions/{}", self.base_url, subscription_id))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        match response.json::<StripeErrorResponse>().await {
            Ok(stripe_error) => Err(StripeError::Api {
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
                status: status.as_u16(),
            }),
            Err(_) => Err(StripeError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
                status: status.as_u16(),
            }),
        }
    }
}
