//! Common test utilities for integration tests
//!
//! A wiremock stand-in for the provider's backend API.

#![allow(dead_code)]

use clerk_sync_auth::{DirectoryConfig, HttpDirectoryClient};
use clerk_sync_types::KeySet;
use secrecy::SecretString;
use serde_json::json;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

pub const TEST_SECRET: &str = "sk_test_integration";

/// Mock provider backend API
pub struct MockClerkApi {
    pub server: MockServer,
}

impl MockClerkApi {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}/v1", self.server.uri())
    }

    /// Client pointed at this server with the test secret
    pub fn client(&self) -> HttpDirectoryClient {
        self.client_with_timeout(Duration::from_secs(5))
    }

    pub fn client_with_timeout(&self, timeout: Duration) -> HttpDirectoryClient {
        let config = DirectoryConfig::new(SecretString::new(TEST_SECRET.to_string()))
            .with_base_url(self.base_url())
            .with_timeout(timeout);
        HttpDirectoryClient::new(config).expect("loopback base URL is accepted")
    }

    /// Serve `keys` from `GET /v1/jwks`, requiring the bearer credential
    pub async fn mock_jwks(&self, keys: &KeySet) {
        Mock::given(method("GET"))
            .and(path("/v1/jwks"))
            .and(header("authorization", format!("Bearer {TEST_SECRET}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(keys))
            .mount(&self.server)
            .await;
    }

    /// Serve `keys` from `GET /v1/jwks` at most `times` times
    pub async fn mock_jwks_times(&self, keys: &KeySet, times: u64) {
        Mock::given(method("GET"))
            .and(path("/v1/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(keys))
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_jwks_response(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/v1/jwks"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Serve a user record from `GET /v1/users/{id}`
    pub async fn mock_user(&self, user: serde_json::Value) {
        let id = user["id"].as_str().expect("user fixture has an id").to_string();
        Mock::given(method("GET"))
            .and(path(format!("/v1/users/{id}")))
            .and(header("authorization", format!("Bearer {TEST_SECRET}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(user))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_user_response(&self, raw_path: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(raw_path))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Provider-style error body
    pub fn error_body(code: &str, message: &str) -> serde_json::Value {
        json!({
            "errors": [{
                "code": code,
                "message": message,
                "long_message": message,
            }]
        })
    }
}

/// User fixture shaped like the provider's user resource
pub fn user_fixture(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "object": "user",
        "username": "ada",
        "first_name": "Ada",
        "last_name": "Lovelace",
        "image_url": "https://img.example.com/ada.png",
        "has_image": true,
        "primary_email_address_id": "idn_1",
        "email_addresses": [{
            "id": "idn_1",
            "object": "email_address",
            "email_address": "ada@example.com",
            "reserved": false,
            "linked_to": [],
            "verification": {"status": "verified", "strategy": "email_code", "attempts": 1}
        }],
        "phone_numbers": [],
        "web3_wallets": [],
        "passkeys": [],
        "public_metadata": {"plan": "pro"},
        "private_metadata": {},
        "unsafe_metadata": {},
        "password_enabled": true,
        "two_factor_enabled": false,
        "totp_enabled": false,
        "backup_code_enabled": false,
        "last_sign_in_at": 1_700_000_000_000i64,
        "banned": false,
        "locked": false
    })
}
