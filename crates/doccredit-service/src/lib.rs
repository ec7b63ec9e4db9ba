//! Doccredit HTTP API Service.
//!
//! This crate provides the HTTP API for the doccredit ledger, including:
//!
//! - Stripe webhooks, reconciled into ledger mutations exactly once per session
//! - Checkout creation and post-redirect payment verification
//! - Ledger views (balance, subscriptions, transactions, purchased documents)
//! - The generation permit used by the document generator
//! - Admin credit grants
//!
//! # Authentication
//!
//! The service supports three authentication methods:
//!
//! 1. **JWT tokens** - For end-user requests (dashboard, checkout)
//! 2. **Service API keys** - For the document generator
//! 3. **Admin API keys** - For manual compensation

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers stay async for axum

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod generation;
pub mod handlers;
pub mod reconcile;
pub mod routes;
pub mod state;
pub mod stripe;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use generation::{request_generation, GenerationDecision};
pub use reconcile::{ReconcileError, ReconcileOutcome, Reconciler};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
