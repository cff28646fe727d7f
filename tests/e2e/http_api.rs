//! HTTP API tests over the in-memory ledger.

use super::{test_config, TestHarness};
use ed25519_dalek::SigningKey;
use gasless_facilitator::payment::signature::sign;
use gasless_facilitator::{FacilitatorEvent, LedgerErrorPolicy, PaymentAuthorizationIntent};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const RECIPIENT: &str = "0xbb";

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

#[tokio::test]
async fn test_health_reports_identity() {
    let harness = TestHarness::setup().await.expect("setup");

    let response = harness.get("/health").await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("json");

    assert_eq!(body["status"], "ok");
    assert_eq!(body["network"], "testnet");
    assert_eq!(body["facilitatorAddress"], harness.facilitator_address().to_string());
    assert!(body["timestamp"].as_str().is_some());

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_request_intent_is_payment_required() {
    let harness = TestHarness::setup().await.expect("setup");
    let before = now();

    let body = json!({
        "sender": harness.user_address().to_string(),
        "recipient": RECIPIENT,
        "amount": "1000000",
    });
    let response = harness.post("/api/auth/request-intent", &body).await.expect("request");
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body: Value = response.json().await.expect("json");

    assert_eq!(body["paymentRequired"], true);
    assert_eq!(body["message"], "Sign this payment authorization to proceed");
    assert!(body["instructions"]["step3"]
        .as_str()
        .unwrap()
        .contains("/api/auth/submit-authorization"));

    let intent = &body["intent"];
    assert_eq!(intent["sender"], harness.user_address().to_string());
    assert_eq!(
        intent["recipient"],
        "0x00000000000000000000000000000000000000000000000000000000000000bb"
    );
    assert_eq!(intent["amount"], 1_000_000);
    assert_eq!(intent["asset"], "APT");
    assert_eq!(intent["network"], "testnet");
    // Module defaults to the facilitator account
    assert_eq!(intent["moduleAddress"], harness.facilitator_address().to_string());

    let expiry = intent["expiry"].as_u64().unwrap();
    assert!(expiry >= before + 300 && expiry <= now() + 300);
    assert!(intent["nonce"].as_u64().unwrap() > 0);

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_request_intent_missing_fields() {
    let harness = TestHarness::setup().await.expect("setup");

    let response = harness
        .post("/api/auth/request-intent", &json!({ "sender": "0xaa" }))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], "Missing required fields");
    assert_eq!(body["required"], json!(["sender", "recipient", "amount"]));

    let response = harness
        .post(
            "/api/auth/request-intent",
            &json!({ "sender": "0xaa", "recipient": RECIPIENT, "amount": 0 }),
        )
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_full_payment_flow() {
    let mut harness = TestHarness::setup().await.expect("setup");

    let authorization = harness.signed_authorization(RECIPIENT, 1_000_000).await.expect("intent");
    let response = harness.submit(&authorization).await.expect("submit");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("json");

    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Payment authorized and executed");
    let hash = body["transactionHash"].as_str().unwrap().to_string();
    assert!(hash.starts_with("0x"));
    assert_eq!(
        body["explorer"],
        format!("https://explorer.aptoslabs.com/txn/{hash}?network=testnet")
    );

    let ledger = harness.ledger().unwrap();
    assert_eq!(ledger.submissions().len(), 1);
    assert_eq!(ledger.submissions()[0].intent().amount(), 1_000_000);

    let response = harness.get(&format!("/api/auth/status/{hash}")).await.expect("status");
    assert_eq!(response.status(), StatusCode::OK);
    let status: Value = response.json().await.expect("json");
    assert_eq!(status, json!({ "transactionHash": hash, "status": "success" }));

    let mut accepted = false;
    while let Ok(Ok(event)) = tokio::time::timeout(Duration::from_millis(200), harness.events().recv()).await {
        if let FacilitatorEvent::AuthorizationAccepted { transaction_hash, .. } = event {
            assert_eq!(transaction_hash, hash);
            accepted = true;
            break;
        }
    }
    assert!(accepted, "expected an AuthorizationAccepted event");

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_replay_is_rejected() {
    let harness = TestHarness::setup().await.expect("setup");

    let authorization = harness.signed_authorization(RECIPIENT, 500).await.expect("intent");
    let first = harness.submit(&authorization).await.expect("submit");
    assert_eq!(first.status(), StatusCode::OK);

    let second = harness.submit(&authorization).await.expect("submit");
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let body: Value = second.json().await.expect("json");
    assert_eq!(
        body,
        json!({ "error": "Invalid authorization", "reason": "Nonce already used (replay attack)" })
    );
    assert_eq!(harness.ledger().unwrap().submissions().len(), 1);

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_expired_authorization_is_rejected() {
    let harness = TestHarness::setup().await.expect("setup");

    let mut intent = harness.request_intent(RECIPIENT, 500).await.expect("intent");
    intent["expiry"] = json!(now() - 10);
    let authorization = TestHarness::sign_intent(harness.user_key(), &intent).expect("sign");

    let response = harness.submit(&authorization).await.expect("submit");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], "Invalid authorization");
    assert_eq!(body["reason"], "Authorization expired");
    assert_eq!(harness.ledger().unwrap().query_count(), 0);

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_tampered_amount_is_unauthorized() {
    let harness = TestHarness::setup().await.expect("setup");

    let mut authorization = harness.signed_authorization(RECIPIENT, 500).await.expect("intent");
    authorization["amount"] = json!(5_000);

    let response = harness.submit(&authorization).await.expect("submit");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], "Invalid signature");
    assert_eq!(
        body["message"],
        "The provided signature does not match the authorization message"
    );
    assert!(harness.ledger().unwrap().submissions().is_empty());

    // The untampered authorization is still usable
    authorization["amount"] = json!(500);
    let response = harness.submit(&authorization).await.expect("submit");
    assert_eq!(response.status(), StatusCode::OK);

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_signature_by_another_key_is_unauthorized() {
    let harness = TestHarness::setup().await.expect("setup");

    let intent = harness.request_intent(RECIPIENT, 500).await.expect("intent");
    let attacker = SigningKey::from_bytes(&[9u8; 32]);
    let authorization = TestHarness::sign_intent(&attacker, &intent).expect("sign");

    let response = harness.submit(&authorization).await.expect("submit");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_submit_missing_fields_lists_required() {
    let harness = TestHarness::setup().await.expect("setup");

    let mut authorization = harness.signed_authorization(RECIPIENT, 500).await.expect("intent");
    authorization.as_object_mut().unwrap().remove("publicKey");

    let response = harness.submit(&authorization).await.expect("submit");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], "Missing required fields");
    assert_eq!(
        body["required"],
        json!(["sender", "recipient", "amount", "nonce", "expiry", "signature", "publicKey"])
    );

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let harness = TestHarness::setup().await.expect("setup");

    let response = reqwest::Client::new()
        .post(format!("{}/api/auth/submit-authorization", harness.base_url()))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], "Invalid JSON body");

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_numeric_fields_accept_strings() {
    let harness = TestHarness::setup().await.expect("setup");

    let mut authorization = harness.signed_authorization(RECIPIENT, 750).await.expect("intent");
    for field in ["amount", "nonce", "expiry"] {
        let value = authorization[field].as_u64().unwrap();
        authorization[field] = json!(value.to_string());
    }

    let response = harness.submit(&authorization).await.expect("submit");
    assert_eq!(response.status(), StatusCode::OK);

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_concurrent_submissions_execute_once() {
    let harness = TestHarness::setup().await.expect("setup");
    harness
        .ledger()
        .unwrap()
        .set_submit_delay(Some(Duration::from_millis(100)));

    let authorization = harness.signed_authorization(RECIPIENT, 500).await.expect("intent");
    let attempts = (0..8).map(|_| harness.submit(&authorization));
    let responses = futures::future::join_all(attempts).await;

    let statuses: Vec<StatusCode> = responses.into_iter().map(|r| r.expect("submit").status()).collect();
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1, "{statuses:?}");
    assert!(statuses
        .iter()
        .all(|s| *s == StatusCode::OK || *s == StatusCode::BAD_REQUEST));
    assert_eq!(harness.ledger().unwrap().submissions().len(), 1);

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_failed_submission_is_stranded() {
    let harness = TestHarness::setup().await.expect("setup");
    harness.ledger().unwrap().set_submit_failure(true);

    let authorization = harness.signed_authorization(RECIPIENT, 500).await.expect("intent");
    let response = harness.submit(&authorization).await.expect("submit");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], "Failed to process authorization");

    let response = harness.get("/api/auth/stranded").await.expect("stranded");
    let body: Value = response.json().await.expect("json");
    let stranded = body["stranded"].as_array().unwrap();
    assert_eq!(stranded.len(), 1);
    assert_eq!(stranded[0]["nonce"], authorization["nonce"]);
    assert_eq!(stranded[0]["sender"], harness.user_address().to_string());

    // The nonce stays consumed once the ledger recovers
    harness.ledger().unwrap().set_submit_failure(false);
    let response = harness.submit(&authorization).await.expect("submit");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_fail_closed_returns_service_unavailable() {
    let mut config = test_config();
    config.payment.ledger_error_policy = LedgerErrorPolicy::FailClosed;
    let harness = TestHarness::setup_with_config(config).await.expect("setup");
    harness.ledger().unwrap().set_query_failure(true);

    let authorization = harness.signed_authorization(RECIPIENT, 500).await.expect("intent");
    let response = harness.submit(&authorization).await.expect("submit");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], "Ledger unavailable");

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_custom_expiry_and_signing_outside_harness() {
    let mut config = test_config();
    config.payment.expiry_minutes = 1;
    let harness = TestHarness::setup_with_config(config).await.expect("setup");

    let intent = harness.request_intent(RECIPIENT, 42).await.expect("intent");
    let expiry = intent["expiry"].as_u64().unwrap();
    assert!(expiry <= now() + 60);

    // Sign directly with the library, as a wallet would
    let authorization = PaymentAuthorizationIntent::new(
        harness.user_address(),
        RECIPIENT.parse().unwrap(),
        42,
        intent["nonce"].as_u64().unwrap(),
        expiry,
    );
    let signature = sign(harness.user_key(), &authorization);
    let body = json!({
        "sender": harness.user_address().to_string(),
        "recipient": RECIPIENT,
        "amount": 42,
        "nonce": intent["nonce"],
        "expiry": expiry,
        "signature": hex::encode(signature.to_bytes()),
        "publicKey": hex::encode(harness.user_key().verifying_key().as_bytes()),
    });
    let response = harness.submit(&body).await.expect("submit");
    assert_eq!(response.status(), StatusCode::OK);

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_unknown_transaction_status() {
    let harness = TestHarness::setup().await.expect("setup");

    let hash = format!("0x{}", "de".repeat(32));
    let response = harness.get(&format!("/api/auth/status/{hash}")).await.expect("status");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body, json!({ "transactionHash": hash, "status": "not_found" }));

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_malformed_transaction_hash_is_bad_request() {
    let harness = TestHarness::setup().await.expect("setup");

    for hash in ["0xdeadbeef", "not-a-hash", "..%2F..%2Faccounts%2F0x1"] {
        let response = harness.get(&format!("/api/auth/status/{hash}")).await.expect("status");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{hash}");
        let body: Value = response.json().await.expect("json");
        assert_eq!(body["error"], "Invalid request");
    }

    harness.teardown().await.expect("teardown");
}
