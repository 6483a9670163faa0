//! Paystack API request and response types.
//!
//! Every Paystack response is wrapped in `{"status": bool, "message": ..., "data": ...}`;
//! [`ApiResponse`] captures that pattern generically. Amounts are integer kobo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level envelope for all Paystack API responses.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

// ---------------------------------------------------------------------------
// GET /bank
// ---------------------------------------------------------------------------

/// A bank as listed by `GET /bank`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// POST /transaction/initialize
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct InitializeRequest {
    pub email: String,
    /// Amount in kobo.
    pub amount: i64,
    pub reference: String,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

// ---------------------------------------------------------------------------
// GET /transaction/verify/{reference} and webhooks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub email: Option<String>,
}

/// A transaction as returned by verify and carried by `charge.*` webhooks.
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub id: Option<i64>,
    /// `success`, `failed`, `abandoned`, `ongoing`, `pending`, `reversed`, ...
    pub status: String,
    pub reference: String,
    /// Amount in kobo.
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub customer: Option<Customer>,
}

// ---------------------------------------------------------------------------
// POST /refund
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RefundRequest<'a> {
    pub transaction: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    pub id: i64,
    /// Amount in kobo.
    pub amount: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

// ---------------------------------------------------------------------------
// GET /bank/resolve
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResolvedAccount {
    pub account_number: String,
    pub account_name: String,
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

/// A webhook delivery. Only `charge.success` carries a [`Transaction`] we act on.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: serde_json::Value,
}

impl WebhookEvent {
    /// Parses `data` as a transaction for `charge.*` events.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if `data` is not a transaction.
    pub fn transaction(&self) -> Result<Transaction, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}
