//! Application state.

use std::sync::Arc;

use doccredit_store::Store;

use crate::config::ServiceConfig;
use crate::reconcile::Reconciler;
use crate::stripe::StripeClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ledger store.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Stripe client for checkout and verification (optional).
    pub stripe: Option<Arc<StripeClient>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let stripe = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(key) {
                Ok(client) => {
                    tracing::info!("Stripe integration enabled");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to build Stripe client");
                    None
                }
            }
        });

        if stripe.is_none() {
            tracing::warn!("Stripe not configured - checkout will not be available");
        }
        if config.stripe_webhook_secret.is_none() {
            tracing::warn!("Stripe webhook secret not configured - webhooks will be rejected");
        }

        Self {
            store,
            config,
            stripe,
        }
    }

    /// Replace the Stripe client (e.g. one pointed at a mock server).
    #[must_use]
    pub fn with_stripe(mut self, client: StripeClient) -> Self {
        self.stripe = Some(Arc::new(client));
        self
    }

    /// Check if Stripe is configured.
    #[must_use]
    pub fn has_stripe(&self) -> bool {
        self.stripe.is_some()
    }

    /// A reconciler over this state's store and catalog.
    #[must_use]
    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.store.as_ref(), &self.config.catalog)
    }
}
