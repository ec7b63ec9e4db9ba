//! Doccredit Client SDK.
//!
//! This crate provides a client library for the document generator and
//! frontends to talk to the doccredit API.
//!
//! # Example
//!
//! ```no_run
//! use doccredit_client::DocCreditClient;
//! use doccredit_core::UserId;
//!
//! # async fn example(user_id: UserId) -> Result<(), doccredit_client::ClientError> {
//! let client = DocCreditClient::new(
//!     "http://doccredit.billing.svc:8080",
//!     "your-service-api-key",
//! )?;
//!
//! // Ask for a permit before generating; the key makes retries safe.
//! let permit = client.request_generation(&user_id, "draft-42").await?;
//! if permit.permit {
//!     println!("Generating, {:?} left", permit.remaining);
//! } else {
//!     println!("Denied: {:?}", permit.reason);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, DocCreditClient};
pub use error::ClientError;
pub use types::*;
