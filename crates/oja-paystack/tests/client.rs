//! Integration tests for `PaystackClient` using wiremock HTTP mocks.

use oja_paystack::{InitializeRequest, PaystackClient, PaystackError};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> PaystackClient {
    PaystackClient::with_base_url("sk_test_key", 30, base_url)
        .expect("client construction should not fail")
        .with_retry(2, 0)
}

#[tokio::test]
async fn list_banks_returns_parsed_banks() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": true,
        "message": "Banks retrieved",
        "data": [
            { "name": "Access Bank", "code": "044", "slug": "access-bank", "currency": "NGN", "active": true },
            { "name": "Guaranty Trust Bank", "code": "058", "slug": "guaranty-trust-bank", "currency": "NGN", "active": true }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/bank"))
        .and(query_param("country", "nigeria"))
        .and(header("authorization", "Bearer sk_test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let banks = test_client(&server.uri())
        .list_banks("nigeria")
        .await
        .expect("should parse banks");

    assert_eq!(banks.len(), 2);
    assert_eq!(banks[0].code, "044");
    assert_eq!(banks[1].name, "Guaranty Trust Bank");
}

#[tokio::test]
async fn initialize_transaction_posts_kobo_amount() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .and(body_partial_json(serde_json::json!({
            "email": "ada@example.com",
            "amount": 313_282,
            "reference": "OJA-ABC",
            "currency": "NGN"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.paystack.com/abc123",
                "access_code": "abc123",
                "reference": "OJA-ABC"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = InitializeRequest {
        email: "ada@example.com".to_string(),
        amount: 313_282,
        reference: "OJA-ABC".to_string(),
        currency: "NGN".to_string(),
        callback_url: None,
        metadata: serde_json::Value::Null,
    };
    let init = test_client(&server.uri())
        .initialize_transaction(&request)
        .await
        .expect("should initialize");

    assert_eq!(init.access_code, "abc123");
    assert_eq!(init.authorization_url, "https://checkout.paystack.com/abc123");
}

#[tokio::test]
async fn verify_transaction_parses_status_and_amount() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/transaction/verify/OJA-ABC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": true,
            "message": "Verification successful",
            "data": {
                "id": 4_099_260_516_i64,
                "status": "success",
                "reference": "OJA-ABC",
                "amount": 313_282,
                "currency": "NGN",
                "gateway_response": "Successful",
                "channel": "card",
                "paid_at": "2026-01-15T10:30:00.000Z",
                "paidAt": "2026-01-15T10:30:00.000Z",
                "customer": { "email": "ada@example.com" }
            }
        })))
        .mount(&server)
        .await;

    let tx = test_client(&server.uri())
        .verify_transaction("OJA-ABC")
        .await
        .expect("should verify");

    assert_eq!(tx.status, "success");
    assert_eq!(tx.amount, 313_282);
    assert_eq!(tx.channel.as_deref(), Some("card"));
    assert!(tx.paid_at.is_some());
}

#[tokio::test]
async fn status_false_surfaces_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/transaction/verify/OJA-NOPE"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "status": false,
            "message": "Transaction reference not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .verify_transaction("OJA-NOPE")
        .await
        .expect_err("should fail");

    assert!(
        matches!(err, PaystackError::Api(ref m) if m == "Transaction reference not found"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn server_errors_are_retried_for_reads() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bank"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bank"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": true,
            "message": "Banks retrieved",
            "data": [{ "name": "Kuda Bank", "code": "50211" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let banks = test_client(&server.uri())
        .list_banks("nigeria")
        .await
        .expect("should succeed on third attempt");
    assert_eq!(banks[0].code, "50211");
    assert!(banks[0].active);
}

#[tokio::test]
async fn refunds_are_not_retried_on_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/refund"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .create_refund("OJA-ABC", Some(50_000))
        .await
        .expect_err("should fail");
    assert!(matches!(err, PaystackError::Http(_)));
}

#[tokio::test]
async fn create_refund_sends_transaction_and_amount() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/refund"))
        .and(body_partial_json(serde_json::json!({
            "transaction": "OJA-ABC",
            "amount": 50_000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": true,
            "message": "Refund has been queued for processing",
            "data": { "id": 3_018_284, "amount": 50_000, "status": "pending", "currency": "NGN" }
        })))
        .mount(&server)
        .await;

    let refund = test_client(&server.uri())
        .create_refund("OJA-ABC", Some(50_000))
        .await
        .expect("should queue refund");
    assert_eq!(refund.id, 3_018_284);
    assert_eq!(refund.status.as_deref(), Some("pending"));
}

#[tokio::test]
async fn resolve_account_returns_name() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bank/resolve"))
        .and(query_param("account_number", "0123456789"))
        .and(query_param("bank_code", "058"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": true,
            "message": "Account number resolved",
            "data": { "account_number": "0123456789", "account_name": "ADA OBI", "bank_id": 9 }
        })))
        .mount(&server)
        .await;

    let account = test_client(&server.uri())
        .resolve_account("0123456789", "058")
        .await
        .expect("should resolve");
    assert_eq!(account.account_name, "ADA OBI");
}

#[tokio::test]
async fn malformed_success_body_is_a_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bank"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": true,
            "message": "ok",
            "data": { "unexpected": "shape" }
        })))
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .list_banks("nigeria")
        .await
        .expect_err("should fail");
    assert!(matches!(err, PaystackError::Deserialize { .. }));
}
