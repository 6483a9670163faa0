use super::*;

fn test_client(base_url: &str) -> PaystackClient {
    PaystackClient::with_base_url("sk_test_123", 30, base_url)
        .expect("client construction should not fail")
}

#[test]
fn build_url_appends_path_and_query() {
    let client = test_client("https://api.paystack.co");
    let url = client
        .build_url("bank", &[("country", "nigeria"), ("perPage", "100")])
        .expect("url");
    assert_eq!(
        url.as_str(),
        "https://api.paystack.co/bank?country=nigeria&perPage=100"
    );
}

#[test]
fn build_url_keeps_base_path_prefix() {
    let client = test_client("http://127.0.0.1:9999/paystack/");
    let url = client.build_url("bank/resolve", &[]).expect("url");
    assert_eq!(url.as_str(), "http://127.0.0.1:9999/paystack/bank/resolve");
}

#[test]
fn build_path_url_encodes_reference() {
    let client = test_client("https://api.paystack.co");
    let url = client
        .build_path_url(&["transaction", "verify", "OJA-1/../x y"])
        .expect("url");
    assert_eq!(
        url.as_str(),
        "https://api.paystack.co/transaction/verify/OJA-1%2F..%2Fx%20y"
    );
}

#[test]
fn invalid_base_url_is_rejected() {
    let err = PaystackClient::with_base_url("sk", 30, "not a url").unwrap_err();
    assert!(matches!(err, PaystackError::InvalidBaseUrl { .. }));
}

#[test]
fn status_false_envelope_is_an_api_error() {
    let body = serde_json::json!({ "status": false, "message": "Invalid key" });
    let err = PaystackClient::check_api_error(&body, reqwest::StatusCode::UNAUTHORIZED)
        .unwrap_err();
    assert!(matches!(err, PaystackError::Api(ref m) if m == "Invalid key"));
}

#[test]
fn status_true_envelope_passes() {
    let body = serde_json::json!({ "status": true, "message": "ok", "data": [] });
    assert!(PaystackClient::check_api_error(&body, reqwest::StatusCode::OK).is_ok());
}

#[test]
fn debug_output_redacts_secret() {
    let client = test_client("https://api.paystack.co");
    let debug = format!("{client:?}");
    assert!(!debug.contains("sk_test_123"));
    assert!(debug.contains("[redacted]"));
}
