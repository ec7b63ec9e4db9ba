//! Audit transaction rows and single-document purchases.
//!
//! Every payment the reconciler processes leaves exactly one `Transaction`,
//! keyed by the provider session id. Rows are immutable once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{PurchaseId, TransactionId, UserId};

/// What was bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Subscription start or renewal.
    Subscription,
    /// One-time credit package.
    CreditPurchase,
    /// One-time single document.
    DocumentPurchase,
}

/// Settlement status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Paid and applied to the ledger.
    Completed,
    /// Awaiting settlement.
    Pending,
    /// Refunded by an administrator.
    Refunded,
    /// Payment failed; nothing was granted.
    Failed,
}

/// An audit record of one provider payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Row id.
    pub id: TransactionId,
    /// Paying user.
    pub user_id: UserId,
    /// Provider session or invoice id. Unique; the dedup key.
    pub provider_session_id: String,
    /// What was bought.
    pub transaction_type: TransactionType,
    /// Amount in minor units.
    pub amount_cents: i64,
    /// ISO currency code.
    pub currency: String,
    /// Settlement status.
    pub status: TransactionStatus,
    /// Human-readable description.
    pub description: String,
    /// Purchase details (plan, package, credits, document type).
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    fn new(
        user_id: UserId,
        provider_session_id: impl Into<String>,
        transaction_type: TransactionType,
        status: TransactionStatus,
        amount_cents: i64,
        currency: impl Into<String>,
        description: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            provider_session_id: provider_session_id.into(),
            transaction_type,
            amount_cents,
            currency: currency.into(),
            status,
            description,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// A settled payment.
    #[must_use]
    pub fn completed(
        user_id: UserId,
        provider_session_id: impl Into<String>,
        transaction_type: TransactionType,
        amount_cents: i64,
        currency: impl Into<String>,
        description: String,
    ) -> Self {
        Self::new(
            user_id,
            provider_session_id,
            transaction_type,
            TransactionStatus::Completed,
            amount_cents,
            currency,
            description,
        )
    }

    /// A payment that failed. Grants nothing but closes the session.
    #[must_use]
    pub fn failed(
        user_id: UserId,
        provider_session_id: impl Into<String>,
        transaction_type: TransactionType,
        amount_cents: i64,
        currency: impl Into<String>,
        description: String,
    ) -> Self {
        Self::new(
            user_id,
            provider_session_id,
            transaction_type,
            TransactionStatus::Failed,
            amount_cents,
            currency,
            description,
        )
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A document bought outright, usable for one generation of that type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedDocument {
    /// Purchase id.
    pub id: PurchaseId,
    /// Buyer.
    pub user_id: UserId,
    /// Catalog document type.
    pub document_type: String,
    /// Checkout session that paid for it.
    pub provider_session_id: String,
    /// When the purchase was recorded.
    pub created_at: DateTime<Utc>,
}

impl PurchasedDocument {
    /// Record a new purchase.
    #[must_use]
    pub fn new(
        user_id: UserId,
        document_type: impl Into<String>,
        provider_session_id: impl Into<String>,
    ) -> Self {
        Self {
            id: PurchaseId::generate(),
            user_id,
            document_type: document_type.into(),
            provider_session_id: provider_session_id.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_transaction() {
        let user_id = UserId::generate();
        let tx = Transaction::completed(
            user_id,
            "cs_123",
            TransactionType::CreditPurchase,
            1699,
            "eur",
            "20 credits".into(),
        )
        .with_metadata(serde_json::json!({"credits": 20}));

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.provider_session_id, "cs_123");
        assert_eq!(tx.metadata["credits"], 20);
    }

    #[test]
    fn transaction_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&TransactionType::CreditPurchase).unwrap(),
            "\"credit_purchase\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Failed).unwrap(),
            "\"failed\""
        );
    }
}
