//! Service configuration.

use serde::Deserialize;
use std::path::Path;

use doccredit_core::Catalog;

/// Default tolerance for Stripe webhook timestamps.
pub const DEFAULT_WEBHOOK_TOLERANCE_SECONDS: i64 = 300;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/doccredit").
    pub data_dir: String,

    /// Identity provider base URL used for JWKS and issuer validation.
    pub auth_base_url: String,

    /// Expected JWT audience (default: "doccredit").
    pub auth_audience: String,

    /// API key the document generator uses for the generation entrypoint.
    pub service_api_key: Option<String>,

    /// API key for admin endpoints.
    pub admin_api_key: Option<String>,

    /// Stripe API key (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret (optional; webhooks are rejected without it).
    pub stripe_webhook_secret: Option<String>,

    /// Maximum age of a signed webhook, in seconds.
    pub stripe_webhook_tolerance_seconds: i64,

    /// Frontend URL for checkout redirects.
    pub frontend_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Plans, credit packages and document prices.
    pub catalog: Catalog,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    ///
    /// # Errors
    ///
    /// Returns an error if `CATALOG_PATH` is set but the file cannot be read
    /// or is not a valid catalog.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load Stripe secrets from file first, then fall back to env vars
        let (stripe_api_key, stripe_webhook_secret) = load_stripe_secrets();

        let catalog = match std::env::var("CATALOG_PATH") {
            Ok(path) => load_catalog(&path)?,
            Err(_) => Catalog::default(),
        };

        Ok(Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/doccredit".into()),
            auth_base_url: std::env::var("AUTH_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:9999".into()),
            auth_audience: std::env::var("AUTH_AUDIENCE").unwrap_or_else(|_| "doccredit".into()),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            stripe_api_key,
            stripe_webhook_secret,
            stripe_webhook_tolerance_seconds: std::env::var("STRIPE_WEBHOOK_TOLERANCE_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_WEBHOOK_TOLERANCE_SECONDS),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            catalog,
        })
    }

    /// Checkout success redirect; Stripe substitutes the session id.
    #[must_use]
    pub fn checkout_success_url(&self) -> String {
        format!(
            "{}/payment-success?session_id={{CHECKOUT_SESSION_ID}}",
            self.frontend_url.trim_end_matches('/')
        )
    }

    /// Checkout cancel redirect.
    #[must_use]
    pub fn checkout_cancel_url(&self) -> String {
        format!("{}/pricing", self.frontend_url.trim_end_matches('/'))
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    CatalogIo {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The catalog file is not a valid catalog.
    #[error("invalid catalog {path}: {source}")]
    CatalogInvalid {
        /// File path.
        path: String,
        /// Underlying error.
        source: doccredit_core::BillingError,
    },
}

fn load_catalog(path: &str) -> Result<Catalog, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::CatalogIo {
        path: path.to_string(),
        source,
    })?;
    let catalog = Catalog::from_json(&contents).map_err(|source| ConfigError::CatalogInvalid {
        path: path.to_string(),
        source,
    })?;
    tracing::info!(path = %path, plans = catalog.plans.len(), "Loaded catalog from file");
    Ok(catalog)
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/stripe.json",
        "doccredit/.secrets/stripe.json",
        "crates/doccredit-service/.secrets/stripe.json",
        "../.secrets/stripe.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (Some(secrets.api_key), secrets.webhook_secret);
        }
    }

    // Fall back to environment variables
    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        std::env::var("STRIPE_API_KEY").ok(),
        std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/doccredit".into(),
            auth_base_url: "http://localhost:9999".into(),
            auth_audience: "doccredit".into(),
            service_api_key: None,
            admin_api_key: None,
            stripe_api_key: None,
            stripe_webhook_secret: None,
            stripe_webhook_tolerance_seconds: DEFAULT_WEBHOOK_TOLERANCE_SECONDS,
            frontend_url: "http://localhost:3000".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            catalog: Catalog::default(),
        }
    }
}
