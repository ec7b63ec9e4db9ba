//! Payment event reconciliation.
//!
//! Turns a typed `PaymentEvent` into at most one ledger mutation plus its
//! audit transaction. A provider session moves `unseen -> completed` or
//! `unseen -> failed`; an unpaid session stays `pending` and writes nothing.
//! The store's session uniqueness check makes every replay a no-op.

use chrono::{DateTime, Utc};
use serde_json::json;

use doccredit_core::{
    BillingError, Catalog, CheckoutCompleted, CheckoutFailed, InvoicePaid, LedgerMutation,
    MutationEffect, PaymentEvent, Purchase, PurchasedDocument, RenewalSkip, Subscription,
    SubscriptionCanceled, SubscriptionPlan, Transaction, TransactionType,
};
use doccredit_store::{Store, StoreError};

use crate::error::ApiError;

/// What reconciling an event did.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The mutation and its transaction were written.
    Applied(MutationEffect),
    /// A failed payment was recorded; nothing was granted.
    Failed,
    /// The session was already processed.
    Duplicate,
    /// The session is not paid yet; nothing was written.
    Pending,
    /// A renewal was not applied.
    Skipped(RenewalSkip),
    /// A subscription was marked canceled.
    Canceled(Subscription),
    /// The event references a subscription or catalog product this ledger
    /// does not know. Nothing was written.
    Inconsistent(String),
}

impl ReconcileOutcome {
    /// Status string reported to the provider and in logs.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Applied(_) => "processed",
            Self::Failed => "failed",
            Self::Duplicate => "duplicate",
            Self::Pending => "pending",
            Self::Skipped(_) => "skipped",
            Self::Canceled(_) => "canceled",
            Self::Inconsistent(_) => "inconsistent",
        }
    }
}

/// Reconciliation failures worth a provider retry.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The ledger store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Store(e) => e.into(),
        }
    }
}

/// Applies payment events to the ledger.
pub struct Reconciler<'a> {
    store: &'a dyn Store,
    catalog: &'a Catalog,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler.
    #[must_use]
    pub fn new(store: &'a dyn Store, catalog: &'a Catalog) -> Self {
        Self { store, catalog }
    }

    /// Reconcile one event.
    ///
    /// # Errors
    ///
    /// Returns an error on store failures only. Purchases of products missing
    /// from the catalog are reported as `Inconsistent`.
    pub fn reconcile(
        &self,
        event: &PaymentEvent,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let outcome = match event {
            PaymentEvent::CheckoutCompleted(completed) => self.checkout_completed(completed, now),
            PaymentEvent::CheckoutFailed(failed) => self.checkout_failed(failed),
            PaymentEvent::InvoicePaid(paid) => self.invoice_paid(paid),
            PaymentEvent::SubscriptionCanceled(canceled) => self.subscription_canceled(canceled),
        }?;

        tracing::info!(
            event = event.kind(),
            status = outcome.status(),
            "Reconciled payment event"
        );
        Ok(outcome)
    }

    fn checkout_completed(
        &self,
        event: &CheckoutCompleted,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if !event.payment_status.is_paid() {
            if self.store.get_transaction_by_session(&event.session_id)?.is_some() {
                return Ok(ReconcileOutcome::Duplicate);
            }
            tracing::info!(
                session_id = %event.session_id,
                user_id = %event.user_id,
                payment_status = ?event.payment_status,
                "Checkout not paid yet, nothing granted"
            );
            return Ok(ReconcileOutcome::Pending);
        }

        let (mutation, description) = match self.grant_for(event, now) {
            Ok(grant) => grant,
            Err(e) => {
                return Ok(inconsistent(format!("paid session {} for {e}", event.session_id)));
            }
        };
        let transaction = Transaction::completed(
            event.user_id,
            event.session_id.clone(),
            event.purchase.transaction_type(),
            event.amount_cents,
            event.currency.clone(),
            description,
        )
        .with_metadata(purchase_metadata(&event.purchase));

        self.apply(&transaction, mutation)
    }

    /// The ledger mutation a paid purchase grants.
    fn grant_for(
        &self,
        event: &CheckoutCompleted,
        now: DateTime<Utc>,
    ) -> Result<(LedgerMutation, String), BillingError> {
        match &event.purchase {
            Purchase::Subscription {
                provider_subscription_id,
                plan_id,
                price_id,
                period,
            } => {
                let plan = self.resolve_plan(plan_id.as_deref(), price_id.as_deref())?;
                let (start, end) = period.map_or_else(
                    || (now, plan.interval.period_end(now)),
                    |p| (p.start, p.end),
                );
                let subscription = Subscription::activate(
                    event.user_id,
                    provider_subscription_id.clone(),
                    plan,
                    start,
                    end,
                    now,
                );
                Ok((
                    LedgerMutation::ActivateSubscription(subscription),
                    format!("{} subscription", plan.name),
                ))
            }
            Purchase::Credits {
                package_id,
                credits,
            } => {
                let credits = match (*credits, package_id) {
                    (0, Some(package_id)) => self.catalog.credit_package(package_id)?.credits,
                    (0, None) => {
                        return Err(BillingError::UnknownPackage(String::new()));
                    }
                    (credits, _) => credits,
                };
                Ok((
                    LedgerMutation::GrantCredits { credits },
                    format!("{credits} credits"),
                ))
            }
            Purchase::Document { document_type } => {
                let document = self.catalog.document(document_type)?;
                Ok((
                    LedgerMutation::RecordDocument(PurchasedDocument::new(
                        event.user_id,
                        document_type.clone(),
                        event.session_id.clone(),
                    )),
                    document.name.clone(),
                ))
            }
        }
    }

    fn resolve_plan(
        &self,
        plan_id: Option<&str>,
        price_id: Option<&str>,
    ) -> Result<&'a SubscriptionPlan, BillingError> {
        if let Some(plan_id) = plan_id {
            if let Ok(plan) = self.catalog.plan(plan_id) {
                return Ok(plan);
            }
        }
        if let Some(price_id) = price_id {
            return self.catalog.plan_by_price_id(price_id);
        }
        Err(BillingError::UnknownPlan(plan_id.unwrap_or_default().to_string()))
    }

    fn checkout_failed(&self, event: &CheckoutFailed) -> Result<ReconcileOutcome, ReconcileError> {
        let transaction = Transaction::failed(
            event.user_id,
            event.session_id.clone(),
            event.purchase.transaction_type(),
            event.amount_cents,
            event.currency.clone(),
            "payment failed".to_string(),
        )
        .with_metadata(purchase_metadata(&event.purchase));

        match self.apply(&transaction, LedgerMutation::AuditOnly)? {
            ReconcileOutcome::Applied(_) => Ok(ReconcileOutcome::Failed),
            other => Ok(other),
        }
    }

    fn invoice_paid(&self, event: &InvoicePaid) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(subscription) = self
            .store
            .find_subscription_by_provider_id(&event.provider_subscription_id)?
        else {
            return Ok(inconsistent(format!(
                "renewal for unknown subscription {}",
                event.provider_subscription_id
            )));
        };

        let plan = match self.resolve_plan(Some(&subscription.plan_id), event.price_id.as_deref())
        {
            Ok(plan) => plan,
            Err(e) => {
                return Ok(inconsistent(format!("renewal {} for {e}", event.invoice_id)));
            }
        };
        let transaction = Transaction::completed(
            subscription.user_id,
            event.invoice_id.clone(),
            TransactionType::Subscription,
            event.amount_cents,
            event.currency.clone(),
            format!("{} renewal", plan.name),
        )
        .with_metadata(json!({
            "provider_subscription_id": event.provider_subscription_id,
            "plan_id": plan.id,
        }));

        let mutation = LedgerMutation::RenewSubscription {
            provider_subscription_id: event.provider_subscription_id.clone(),
            documents_limit: plan.documents_limit,
            period_start: event.period.start,
            period_end: event.period.end,
        };

        match self.apply(&transaction, mutation) {
            Ok(ReconcileOutcome::Applied(MutationEffect::RenewalSkipped { reason, .. })) => {
                tracing::info!(
                    invoice_id = %event.invoice_id,
                    provider_subscription_id = %event.provider_subscription_id,
                    reason = ?reason,
                    "Renewal skipped"
                );
                Ok(ReconcileOutcome::Skipped(reason))
            }
            Err(ReconcileError::Store(StoreError::NotFound { .. })) => Ok(inconsistent(format!(
                "subscription {} disappeared during renewal",
                event.provider_subscription_id
            ))),
            other => other,
        }
    }

    fn subscription_canceled(
        &self,
        event: &SubscriptionCanceled,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match self
            .store
            .mark_subscription_canceled(&event.provider_subscription_id, event.canceled_at)
        {
            Ok(subscription) => Ok(ReconcileOutcome::Canceled(subscription)),
            Err(StoreError::NotFound { .. }) => Ok(inconsistent(format!(
                "cancellation for unknown subscription {}",
                event.provider_subscription_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn apply(
        &self,
        transaction: &Transaction,
        mutation: LedgerMutation,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match self.store.apply_payment(transaction, mutation) {
            Ok(effect) => Ok(ReconcileOutcome::Applied(effect)),
            Err(StoreError::DuplicateSession { session_id }) => {
                tracing::info!(session_id = %session_id, "Session already processed");
                Ok(ReconcileOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn inconsistent(detail: String) -> ReconcileOutcome {
    tracing::warn!(detail = %detail, "Ledger inconsistency");
    ReconcileOutcome::Inconsistent(detail)
}

fn purchase_metadata(purchase: &Purchase) -> serde_json::Value {
    match purchase {
        Purchase::Subscription {
            provider_subscription_id,
            plan_id,
            ..
        } => json!({
            "provider_subscription_id": provider_subscription_id,
            "plan_id": plan_id,
        }),
        Purchase::Credits {
            package_id,
            credits,
        } => json!({ "package_id": package_id, "credits": credits }),
        Purchase::Document { document_type } => json!({ "document_type": document_type }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use doccredit_core::{
        BillingPeriod, PaymentStatus, SubscriptionStatus, TransactionStatus, UserId,
    };
    use doccredit_store::MemoryStore;

    fn paid(session_id: &str, user_id: UserId, purchase: Purchase) -> PaymentEvent {
        PaymentEvent::CheckoutCompleted(CheckoutCompleted {
            session_id: session_id.into(),
            user_id,
            payment_status: PaymentStatus::Paid,
            amount_cents: 499,
            currency: "eur".into(),
            purchase,
        })
    }

    fn subscribe(store: &MemoryStore, catalog: &Catalog, user_id: UserId, now: DateTime<Utc>) {
        let event = paid(
            "cs_sub",
            user_id,
            Purchase::Subscription {
                provider_subscription_id: "sub_1".into(),
                plan_id: Some("basic-monthly".into()),
                price_id: None,
                period: None,
            },
        );
        Reconciler::new(store, catalog).reconcile(&event, now).unwrap();
    }

    #[test]
    fn credit_purchase_falls_back_to_package_size() {
        let store = MemoryStore::new();
        let catalog = Catalog::default();
        let user_id = UserId::generate();
        let event = paid(
            "cs_pack",
            user_id,
            Purchase::Credits {
                package_id: Some("medium-pack".into()),
                credits: 0,
            },
        );

        let outcome = Reconciler::new(&store, &catalog)
            .reconcile(&event, Utc::now())
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Applied(MutationEffect::CreditsGranted { balance: 20 })
        );
    }

    #[test]
    fn replayed_checkout_is_duplicate() {
        let store = MemoryStore::new();
        let catalog = Catalog::default();
        let reconciler = Reconciler::new(&store, &catalog);
        let user_id = UserId::generate();
        let event = paid(
            "cs_twice",
            user_id,
            Purchase::Credits {
                package_id: None,
                credits: 5,
            },
        );

        assert_eq!(reconciler.reconcile(&event, Utc::now()).unwrap().status(), "processed");
        assert_eq!(
            reconciler.reconcile(&event, Utc::now()).unwrap(),
            ReconcileOutcome::Duplicate
        );
        assert_eq!(store.get_balance(&user_id).unwrap().credits, 5);
    }

    #[test]
    fn unknown_plan_is_inconsistent() {
        let store = MemoryStore::new();
        let catalog = Catalog::default();
        let event = paid(
            "cs_gold",
            UserId::generate(),
            Purchase::Subscription {
                provider_subscription_id: "sub_gold".into(),
                plan_id: Some("gold".into()),
                price_id: None,
                period: None,
            },
        );
        let outcome = Reconciler::new(&store, &catalog)
            .reconcile(&event, Utc::now())
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Inconsistent(detail) if detail.contains("gold")));
        assert!(store.get_transaction_by_session("cs_gold").unwrap().is_none());
        assert!(store.find_subscription_by_provider_id("sub_gold").unwrap().is_none());
    }

    #[test]
    fn failed_checkout_is_terminal() {
        let store = MemoryStore::new();
        let catalog = Catalog::default();
        let reconciler = Reconciler::new(&store, &catalog);
        let user_id = UserId::generate();
        let purchase = Purchase::Credits {
            package_id: Some("small-pack".into()),
            credits: 5,
        };
        let failed = PaymentEvent::CheckoutFailed(CheckoutFailed {
            session_id: "cs_sepa".into(),
            user_id,
            amount_cents: 499,
            currency: "eur".into(),
            purchase: purchase.clone(),
        });

        assert_eq!(reconciler.reconcile(&failed, Utc::now()).unwrap(), ReconcileOutcome::Failed);
        let tx = store.get_transaction_by_session("cs_sepa").unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);

        let late = paid("cs_sepa", user_id, purchase);
        assert_eq!(
            reconciler.reconcile(&late, Utc::now()).unwrap(),
            ReconcileOutcome::Duplicate
        );
        assert_eq!(store.get_balance(&user_id).unwrap().credits, 0);
    }

    #[test]
    fn renewal_resets_allowance() {
        let store = MemoryStore::new();
        let catalog = Catalog::default();
        let user_id = UserId::generate();
        let now = Utc::now();
        subscribe(&store, &catalog, user_id, now);

        let sub = store.get_active_subscription(&user_id, now).unwrap().unwrap();
        for _ in 0..sub.documents_remaining {
            store.decrement_subscription_documents(&sub.id, 1).unwrap();
        }

        let renewal = PaymentEvent::InvoicePaid(InvoicePaid {
            invoice_id: "in_2".into(),
            provider_subscription_id: "sub_1".into(),
            amount_cents: 999,
            currency: "eur".into(),
            period: BillingPeriod {
                start: sub.current_period_end,
                end: sub.current_period_end + Duration::days(30),
            },
            price_id: None,
        });
        let outcome = Reconciler::new(&store, &catalog)
            .reconcile(&renewal, now)
            .unwrap();
        assert_eq!(outcome.status(), "processed");

        let renewed = store.get_subscription(&sub.id).unwrap().unwrap();
        assert_eq!(renewed.documents_remaining, 10);
        assert!(renewed.current_period_end > sub.current_period_end);
    }

    #[test]
    fn renewal_after_cancel_is_skipped() {
        let store = MemoryStore::new();
        let catalog = Catalog::default();
        let reconciler = Reconciler::new(&store, &catalog);
        let user_id = UserId::generate();
        let now = Utc::now();
        subscribe(&store, &catalog, user_id, now);

        let cancel = PaymentEvent::SubscriptionCanceled(SubscriptionCanceled {
            provider_subscription_id: "sub_1".into(),
            canceled_at: now,
        });
        let ReconcileOutcome::Canceled(sub) = reconciler.reconcile(&cancel, now).unwrap() else {
            panic!("expected cancellation");
        };
        assert_eq!(sub.status, SubscriptionStatus::Canceled);

        let renewal = PaymentEvent::InvoicePaid(InvoicePaid {
            invoice_id: "in_late".into(),
            provider_subscription_id: "sub_1".into(),
            amount_cents: 999,
            currency: "eur".into(),
            period: BillingPeriod {
                start: now + Duration::days(30),
                end: now + Duration::days(60),
            },
            price_id: None,
        });
        assert_eq!(
            reconciler.reconcile(&renewal, now).unwrap(),
            ReconcileOutcome::Skipped(RenewalSkip::Canceled)
        );
        assert!(store.get_active_subscription(&user_id, now).unwrap().is_none());
    }

    #[test]
    fn cancellation_keeps_provider_time() {
        let store = MemoryStore::new();
        let catalog = Catalog::default();
        let reconciler = Reconciler::new(&store, &catalog);
        let user_id = UserId::generate();
        let now = Utc::now();
        subscribe(&store, &catalog, user_id, now - Duration::hours(2));

        let canceled_at = now - Duration::hours(1);
        let cancel = PaymentEvent::SubscriptionCanceled(SubscriptionCanceled {
            provider_subscription_id: "sub_1".into(),
            canceled_at,
        });
        let ReconcileOutcome::Canceled(sub) = reconciler.reconcile(&cancel, now).unwrap() else {
            panic!("expected cancellation");
        };
        assert_eq!(sub.updated_at, canceled_at);

        let stored = store.find_subscription_by_provider_id("sub_1").unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Canceled);
        assert_eq!(stored.updated_at, canceled_at);
    }

    #[test]
    fn events_for_unknown_subscriptions_are_inconsistent() {
        let store = MemoryStore::new();
        let catalog = Catalog::default();
        let reconciler = Reconciler::new(&store, &catalog);
        let now = Utc::now();

        let cancel = PaymentEvent::SubscriptionCanceled(SubscriptionCanceled {
            provider_subscription_id: "sub_ghost".into(),
            canceled_at: now,
        });
        assert_eq!(reconciler.reconcile(&cancel, now).unwrap().status(), "inconsistent");

        let renewal = PaymentEvent::InvoicePaid(InvoicePaid {
            invoice_id: "in_ghost".into(),
            provider_subscription_id: "sub_ghost".into(),
            amount_cents: 999,
            currency: "eur".into(),
            period: BillingPeriod {
                start: now,
                end: now + Duration::days(30),
            },
            price_id: None,
        });
        assert_eq!(reconciler.reconcile(&renewal, now).unwrap().status(), "inconsistent");
        assert!(store.get_transaction_by_session("in_ghost").unwrap().is_none());
    }
}
