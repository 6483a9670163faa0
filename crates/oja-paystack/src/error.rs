use thiserror::Error;

/// Errors returned by the Paystack API client.
#[derive(Debug, Error)]
pub enum PaystackError {
    /// Network or TLS failure, or a 5xx status from Paystack.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Paystack answered with `"status": false` (or a non-JSON 4xx).
    #[error("Paystack API error: {0}")]
    Api(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The client was built with an unusable base URL.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
