//! Admin HTTP API tests.
//!
//! These tests require the admin server running (cargo run -p larder-admin).
//! They cover what can be checked without completing an OAuth login.
//!
//! Run with: cargo test -p larder-integration-tests -- --ignored

use reqwest::{Client, StatusCode, redirect::Policy};
use serde_json::{Value, json};

use larder_integration_tests::admin_base_url;

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_api_requires_login() {
    let client = client();
    let base_url = admin_base_url();

    for path in ["/api/me", "/api/products", "/api/orders", "/api/customers", "/api/inventory"] {
        let resp = client
            .get(format!("{base_url}{path}"))
            .send()
            .await
            .expect("Failed to reach admin");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
        let body: Value = resp.json().await.expect("Failed to parse JSON body");
        assert_eq!(body["error"], "Not logged in", "{path}");
    }

    let resp = client
        .post(format!("{base_url}/api/products"))
        .json(&json!({"name": "Sneaky", "price_cents": 1}))
        .send()
        .await
        .expect("Failed to reach admin");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_forged_token_is_rejected() {
    let base_url = admin_base_url();
    let resp = client()
        .get(format!("{base_url}/api/me"))
        .header("cookie", "auth_token=eyJhbGciOiJIUzI1NiJ9.e30.forged")
        .send()
        .await
        .expect("Failed to reach admin");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_login_redirects_to_provider() {
    let base_url = admin_base_url();
    let resp = client()
        .get(format!("{base_url}/auth/login"))
        .send()
        .await
        .expect("Failed to reach admin");

    assert!(resp.status().is_redirection());
    let location = resp
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("Missing location header");
    assert!(location.contains("state="));
    assert!(location.contains("response_type=code"));
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_callback_with_wrong_state_is_rejected() {
    let base_url = admin_base_url();
    let resp = client()
        .get(format!("{base_url}/auth/callback"))
        .query(&[("code", "abc"), ("state", "not-the-state")])
        .send()
        .await
        .expect("Failed to reach admin");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
