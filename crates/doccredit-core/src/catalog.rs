//! Product catalog: subscription plans, credit packages and single documents.
//!
//! Checkout creation validates requests against the catalog, and the
//! reconciler uses it to turn a paid plan into a document allowance.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};

/// Default settlement currency.
pub const DEFAULT_CURRENCY: &str = "eur";

/// Recurring billing interval of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    /// Renews every calendar month.
    Month,
    /// Renews every calendar year.
    Year,
}

impl BillingInterval {
    /// Return the end of a period starting at `start`.
    #[must_use]
    pub fn period_end(self, start: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            Self::Month => Months::new(1),
            Self::Year => Months::new(12),
        };
        start.checked_add_months(months).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Provider wire name (`month` / `year`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// A recurring plan granting a document allowance per period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    /// Plan identifier used by checkout requests.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Price per period in minor units.
    pub price_cents: i64,
    /// Billing interval.
    pub interval: BillingInterval,
    /// Documents granted per period.
    pub documents_limit: u32,
    /// Provider price id, when the plan is backed by a pre-created price.
    #[serde(default)]
    pub price_id: Option<String>,
}

/// A one-time bundle of non-expiring credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPackage {
    /// Package identifier used by checkout requests.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Credits granted on payment.
    pub credits: u64,
    /// Price in minor units.
    pub price_cents: i64,
}

/// Price of a single generated document bought outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPrice {
    /// Document type key (e.g. `contract`).
    pub document_type: String,
    /// Display name.
    pub name: String,
    /// Price in minor units.
    pub price_cents: i64,
    /// Short description shown on the provider's checkout page.
    pub description: String,
}

/// Everything a user can buy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// ISO currency code for all prices.
    pub currency: String,
    /// Subscription plans.
    pub plans: Vec<SubscriptionPlan>,
    /// Credit packages.
    pub credit_packages: Vec<CreditPackage>,
    /// Single-document prices.
    pub documents: Vec<DocumentPrice>,
}

impl Default for Catalog {
    fn default() -> Self {
        let plan = |id: &str, name: &str, price_cents, documents_limit| SubscriptionPlan {
            id: id.into(),
            name: name.into(),
            price_cents,
            interval: BillingInterval::Month,
            documents_limit,
            price_id: None,
        };
        let package = |id: &str, name: &str, credits, price_cents| CreditPackage {
            id: id.into(),
            name: name.into(),
            credits,
            price_cents,
        };

        Self {
            currency: DEFAULT_CURRENCY.into(),
            plans: vec![
                plan("basic", "Basic", 999, 5),
                plan("premium", "Premium", 1999, 15),
                plan("pro", "Professional", 2999, 50),
                plan("basic-monthly", "Basic Monthly", 999, 10),
            ],
            credit_packages: vec![
                package("small-pack", "Small pack", 5, 499),
                package("medium-pack", "Medium pack", 20, 1699),
                package("large-pack", "Large pack", 50, 3499),
            ],
            documents: vec![
                DocumentPrice {
                    document_type: "contract".into(),
                    name: "Contract".into(),
                    price_cents: 999,
                    description: "Standard contract".into(),
                },
                DocumentPrice {
                    document_type: "agreement".into(),
                    name: "Agreement".into(),
                    price_cents: 799,
                    description: "Agreement between parties".into(),
                },
            ],
        }
    }
}

impl Catalog {
    /// Parse a catalog from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidCatalog` if the JSON is malformed or fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Self =
            serde_json::from_str(json).map_err(|e| BillingError::InvalidCatalog(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check that ids are unique and every amount is positive.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidCatalog` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for plan in &self.plans {
            if !seen.insert(("plan", plan.id.as_str())) {
                return Err(BillingError::InvalidCatalog(format!("duplicate plan {}", plan.id)));
            }
            if plan.documents_limit == 0 || plan.price_cents <= 0 {
                return Err(BillingError::InvalidCatalog(format!(
                    "plan {} needs a positive price and document limit",
                    plan.id
                )));
            }
        }
        for package in &self.credit_packages {
            if !seen.insert(("package", package.id.as_str())) {
                return Err(BillingError::InvalidCatalog(format!(
                    "duplicate package {}",
                    package.id
                )));
            }
            if package.credits == 0 || package.price_cents <= 0 {
                return Err(BillingError::InvalidCatalog(format!(
                    "package {} needs positive credits and price",
                    package.id
                )));
            }
        }
        for document in &self.documents {
            if !seen.insert(("document", document.document_type.as_str())) {
                return Err(BillingError::InvalidCatalog(format!(
                    "duplicate document type {}",
                    document.document_type
                )));
            }
        }
        Ok(())
    }

    /// Look up a plan by id.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::UnknownPlan` if no plan has this id.
    pub fn plan(&self, plan_id: &str) -> Result<&SubscriptionPlan> {
        self.plans
            .iter()
            .find(|p| p.id == plan_id)
            .ok_or_else(|| BillingError::UnknownPlan(plan_id.to_string()))
    }

    /// Look up a plan by the provider's price id.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::UnknownPlan` if no plan carries this price id.
    pub fn plan_by_price_id(&self, price_id: &str) -> Result<&SubscriptionPlan> {
        self.plans
            .iter()
            .find(|p| p.price_id.as_deref() == Some(price_id))
            .ok_or_else(|| BillingError::UnknownPlan(price_id.to_string()))
    }

    /// Look up a credit package by id.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::UnknownPackage` if no package has this id.
    pub fn credit_package(&self, package_id: &str) -> Result<&CreditPackage> {
        self.credit_packages
            .iter()
            .find(|p| p.id == package_id)
            .ok_or_else(|| BillingError::UnknownPackage(package_id.to_string()))
    }

    /// Look up a single-document price by document type.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::UnknownDocument` if the type is not sold.
    pub fn document(&self, document_type: &str) -> Result<&DocumentPrice> {
        self.documents
            .iter()
            .find(|d| d.document_type == document_type)
            .ok_or_else(|| BillingError::UnknownDocument(document_type.to_string()))
    }
}
