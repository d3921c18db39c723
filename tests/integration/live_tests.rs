//! Smoke tests against a running server.
//!
//! Start the server with a migrated database, then run
//! `cargo test --test live_tests -- --ignored`.

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:3000";

/// Register an admin so reader registration has someone to assign
async fn ensure_admin(client: &Client) {
    let response = client
        .post(format!("{}/api/auth/register", BASE_URL))
        .json(&json!({
            "username": "Smoke Staff",
            "email": "smoke-staff@example.org",
            "password": "smoke-pass",
            "isAdmin": true
        }))
        .send()
        .await
        .expect("Failed to send register request");

    // 409 when a previous run already created it
    assert!(response.status() == 201 || response.status() == 409);
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_readiness_reaches_database() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_admin_login() {
    let client = Client::new();
    ensure_admin(&client).await;

    let response = client
        .post(format!("{}/api/auth/login", BASE_URL))
        .json(&json!({
            "email": "smoke-staff@example.org",
            "password": "smoke-pass",
            "isAdmin": true
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["kind"], "admin");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();
    ensure_admin(&client).await;

    let response = client
        .post(format!("{}/api/auth/login", BASE_URL))
        .json(&json!({
            "email": "smoke-staff@example.org",
            "password": "wrong",
            "isAdmin": true
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore]
async fn test_list_books() {
    let client = Client::new();

    let response = client
        .get(format!("{}/api/books?page=1&size=5", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["data"].is_array());
    assert!(body["pagination"]["total"].is_number());
    assert_eq!(body["pagination"]["pageSize"], 5);
}

#[tokio::test]
#[ignore]
async fn test_list_loan_records() {
    let client = Client::new();

    let response = client
        .get(format!("{}/api/borrow/list?status=3", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["data"].is_array());
}

#[tokio::test]
#[ignore]
async fn test_missing_record() {
    let client = Client::new();

    let response = client
        .get(format!("{}/api/borrow/records/2147483647", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);
}
