//! Typed client for the Paystack REST API.
//!
//! Covers the bank list, transaction initialisation and verification,
//! refunds, account-number resolution, and webhook signature checks.

pub mod client;
pub mod error;
pub(crate) mod retry;
pub mod types;
pub mod webhook;

pub use client::PaystackClient;
pub use error::PaystackError;
pub use types::{
    Bank, Customer, InitializeRequest, InitializedTransaction, Refund, ResolvedAccount,
    Transaction, WebhookEvent,
};
pub use webhook::{sign_webhook_body, verify_webhook_signature, SIGNATURE_HEADER};
