//! API handlers.

pub mod admin;
pub mod catalog;
pub mod checkout;
pub mod generation;
pub mod health;
pub mod ledger;
pub mod payments;
pub mod webhooks;
