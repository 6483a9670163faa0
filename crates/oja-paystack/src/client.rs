//! HTTP client for the Paystack REST API.
//!
//! Wraps `reqwest` with bearer-key auth, retry/back-off and typed response
//! decoding. Every endpoint checks the `"status"` flag of the JSON envelope
//! and surfaces `false` as [`PaystackError::Api`].

use std::time::Duration;

use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::PaystackError;
use crate::retry::{retry_with_backoff, Idempotency};
use crate::types::{
    ApiResponse, Bank, InitializeRequest, InitializedTransaction, Refund, RefundRequest,
    ResolvedAccount, Transaction,
};

const DEFAULT_BASE_URL: &str = "https://api.paystack.co";
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Client for the Paystack REST API.
///
/// Use [`PaystackClient::new`] for production or
/// [`PaystackClient::with_base_url`] to point at a mock server in tests.
#[derive(Clone)]
pub struct PaystackClient {
    client: Client,
    secret_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl std::fmt::Debug for PaystackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaystackClient")
            .field("base_url", &self.base_url.as_str())
            .field("secret_key", &"[redacted]")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl PaystackClient {
    /// Creates a new client pointed at the production Paystack API.
    ///
    /// # Errors
    ///
    /// Returns [`PaystackError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(secret_key: &str, timeout_secs: u64) -> Result<Self, PaystackError> {
        Self::with_base_url(secret_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`PaystackError::Http`] if the `reqwest::Client` cannot be
    /// constructed, or [`PaystackError::InvalidBaseUrl`] if `base_url` does
    /// not parse.
    pub fn with_base_url(
        secret_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, PaystackError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("oja/0.1 (marketplace)")
            .build()?;

        // Trailing slash so Url::join appends path segments instead of
        // replacing the last one.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| PaystackError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            secret_key: secret_key.to_owned(),
            base_url: parsed,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        })
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Lists the banks Paystack supports in `country` (e.g. `"nigeria"`).
    ///
    /// # Errors
    ///
    /// Returns [`PaystackError`] on network failure, an API error envelope,
    /// or an unexpected response shape.
    pub async fn list_banks(&self, country: &str) -> Result<Vec<Bank>, PaystackError> {
        let url = self.build_url("bank", &[("country", country), ("perPage", "100")])?;
        self.send_json::<Vec<Bank>, ()>(Method::GET, url, None, Idempotency::Safe)
            .await
    }

    /// Starts a transaction and returns the hosted checkout URL.
    ///
    /// Retries are safe because Paystack rejects a reused reference.
    ///
    /// # Errors
    ///
    /// Returns [`PaystackError`] on network failure, an API error envelope,
    /// or an unexpected response shape.
    pub async fn initialize_transaction(
        &self,
        request: &InitializeRequest,
    ) -> Result<InitializedTransaction, PaystackError> {
        let url = self.build_url("transaction/initialize", &[])?;
        self.send_json(Method::POST, url, Some(request), Idempotency::Safe)
            .await
    }

    /// Fetches the current state of a transaction by reference.
    ///
    /// # Errors
    ///
    /// Returns [`PaystackError`] on network failure, an API error envelope,
    /// or an unexpected response shape.
    pub async fn verify_transaction(&self, reference: &str) -> Result<Transaction, PaystackError> {
        let url = self.build_path_url(&["transaction", "verify", reference])?;
        self.send_json::<Transaction, ()>(Method::GET, url, None, Idempotency::Safe)
            .await
    }

    /// Refunds a transaction. `amount_kobo = None` refunds the full amount.
    ///
    /// # Errors
    ///
    /// Returns [`PaystackError`] on network failure, an API error envelope,
    /// or an unexpected response shape.
    pub async fn create_refund(
        &self,
        reference: &str,
        amount_kobo: Option<i64>,
    ) -> Result<Refund, PaystackError> {
        let url = self.build_url("refund", &[])?;
        let body = RefundRequest {
            transaction: reference,
            amount: amount_kobo,
        };
        self.send_json(Method::POST, url, Some(&body), Idempotency::Unsafe)
            .await
    }

    /// Resolves a NUBAN account number to the registered account name.
    ///
    /// # Errors
    ///
    /// Returns [`PaystackError::Api`] when Paystack cannot resolve the
    /// account, or another [`PaystackError`] on transport failures.
    pub async fn resolve_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount, PaystackError> {
        let url = self.build_url(
            "bank/resolve",
            &[("account_number", account_number), ("bank_code", bank_code)],
        )?;
        self.send_json::<ResolvedAccount, ()>(Method::GET, url, None, Idempotency::Safe)
            .await
    }

    fn build_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, PaystackError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| PaystackError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Like [`Self::build_url`] but percent-encodes each segment, for paths
    /// that embed caller-supplied values.
    fn build_path_url(&self, segments: &[&str]) -> Result<Url, PaystackError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| PaystackError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "cannot be a base".to_owned(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send_json<T, B>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        idempotency: Idempotency,
    ) -> Result<T, PaystackError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let context = format!("{method} {}", url.path());
        let value = retry_with_backoff(self.max_retries, self.backoff_base_ms, idempotency, || {
            self.request_once(method.clone(), url.clone(), body)
        })
        .await?;

        let envelope: ApiResponse<T> =
            serde_json::from_value(value).map_err(|e| PaystackError::Deserialize {
                context,
                source: e,
            })?;
        Ok(envelope.data)
    }

    /// One round trip: 5xx becomes a retriable [`PaystackError::Http`], any
    /// other response is parsed and its envelope checked.
    async fn request_once<B>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<serde_json::Value, PaystackError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self
            .client
            .request(method, url.clone())
            .bearer_auth(&self.secret_key);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(response.error_for_status().map_or_else(PaystackError::Http, |_| {
                PaystackError::Api(format!("HTTP {status}"))
            }));
        }

        let text = response.text().await?;
        let value: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(PaystackError::Api(format!("HTTP {status}")));
            }
            Err(e) => {
                return Err(PaystackError::Deserialize {
                    context: url.path().to_owned(),
                    source: e,
                })
            }
        };

        Self::check_api_error(&value, status)?;
        Ok(value)
    }

    /// Checks the top-level `"status"` flag and returns the message on failure.
    fn check_api_error(
        body: &serde_json::Value,
        http_status: reqwest::StatusCode,
    ) -> Result<(), PaystackError> {
        let ok = body.get("status").and_then(serde_json::Value::as_bool);
        if ok == Some(true) && http_status.is_success() {
            return Ok(());
        }
        let msg = body
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| format!("HTTP {http_status}"), str::to_owned);
        Err(PaystackError::Api(msg))
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
