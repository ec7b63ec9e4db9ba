//! Stripe integration.
//!
//! Stripe handles:
//! - Hosted Checkout for subscriptions, credit packages and single documents
//! - Webhooks, verified here and turned into typed `PaymentEvent`s
//! - Session and subscription lookups for the verification endpoint

pub mod client;
pub mod events;
pub mod signature;
pub mod types;

pub use client::{CheckoutMode, CheckoutRequest, LineItem, StripeClient, StripeError};
pub use events::{checkout_completed, parse_event, EventError};
pub use signature::{verify_signature, SignatureError};
pub use types::*;
