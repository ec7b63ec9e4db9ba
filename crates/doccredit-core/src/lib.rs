//! Core types and rules for doccredit.
//!
//! This crate provides the foundational types used throughout the doccredit ledger:
//!
//! - **Identifiers**: `UserId`, `TransactionId`, `SubscriptionId`, `PurchaseId`
//! - **Ledger**: `CreditBalance`, `ConsumptionRecord`, `ConsumeOutcome`, `LedgerMutation`
//! - **Subscriptions**: `Subscription`, `SubscriptionStatus`
//! - **Audit**: `Transaction`, `TransactionType`, `TransactionStatus`, `PurchasedDocument`
//! - **Catalog**: `Catalog`, `SubscriptionPlan`, `CreditPackage`, `DocumentPrice`
//! - **Payments**: `PaymentEvent` and the purchase variants the reconciler understands
//! - **Entitlement**: the pure `evaluate` decision function
//!
//! # Units
//!
//! - One credit pays for exactly one generated document and never expires.
//! - A subscription carries `documents_remaining`, reset on every paid renewal.
//! - Money amounts are integer minor units (`amount_cents`) with an ISO currency code.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod entitlement;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod payment;
pub mod subscription;
pub mod transaction;

pub use catalog::{BillingInterval, Catalog, CreditPackage, DocumentPrice, SubscriptionPlan};
pub use entitlement::{evaluate, DenialReason, Entitlement, Resource};
pub use error::{BillingError, Result};
pub use ids::{IdError, PurchaseId, SubscriptionId, TransactionId, UserId};
pub use ledger::{
    ConsumeOutcome, ConsumptionRecord, CreditBalance, LedgerMutation, MutationEffect,
    RenewalSkip,
};
pub use payment::{
    BillingPeriod, CheckoutCompleted, CheckoutFailed, InvoicePaid, PaymentEvent, PaymentStatus,
    Purchase, SubscriptionCanceled,
};
pub use subscription::{Subscription, SubscriptionStatus};
pub use transaction::{PurchasedDocument, Transaction, TransactionStatus, TransactionType};
