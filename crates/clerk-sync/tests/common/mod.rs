//! Common test utilities for session integration tests

#![allow(dead_code)]

use clerk_sync::{ClerkSyncConfig, SessionOptions, SessionStateMachine, WithdrawPolicy};
use clerk_sync_auth::testutil::{MockDirectory, test_key_set};
use clerk_sync_auth::{KeySetCache, RemoteDirectory, TokenVerifier};
use clerk_sync_types::KeySet;
use serde_json::json;
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

pub const TEST_SECRET: &str = "sk_test_sessions";

/// Session whose keys and users come from `directory`
pub fn directory_session(
    directory: &Arc<MockDirectory>,
    options: SessionOptions,
) -> Arc<SessionStateMachine> {
    let directory: Arc<dyn RemoteDirectory> = directory.clone();
    let cache = KeySetCache::new(KeySet::empty(), Some(Arc::clone(&directory)));
    let verifier = Arc::new(TokenVerifier::new(Arc::new(cache)));
    Arc::new(SessionStateMachine::new(verifier, Some(directory), options))
}

/// Session verifying against both static test keys, users from `directory`
pub fn static_session(
    directory: &Arc<MockDirectory>,
    options: SessionOptions,
) -> Arc<SessionStateMachine> {
    let cache = KeySetCache::with_static_keys(test_key_set());
    let verifier = Arc::new(TokenVerifier::new(Arc::new(cache)));
    let directory: Arc<dyn RemoteDirectory> = directory.clone();
    Arc::new(SessionStateMachine::new(verifier, Some(directory), options))
}

pub fn no_fetch() -> SessionOptions {
    SessionOptions {
        fetch_user_on_auth: false,
        ..SessionOptions::default()
    }
}

pub fn clear_identity() -> SessionOptions {
    SessionOptions {
        withdraw_policy: WithdrawPolicy::ClearIdentity,
        ..SessionOptions::default()
    }
}

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

    /// Configuration pointing the runtime at this server
    pub fn config(&self) -> ClerkSyncConfig {
        ClerkSyncConfig::from_env_vars([
            ("CLERK_SECRET_KEY", TEST_SECRET.to_string()),
            ("CLERK_API_BASE_URL", format!("{}/v1", self.server.uri())),
            ("CLERK_REQUEST_TIMEOUT_SECS", "2".to_string()),
        ])
        .expect("test configuration parses")
    }

    pub async fn mock_jwks(&self, keys: &KeySet) {
        Mock::given(method("GET"))
            .and(path("/v1/jwks"))
            .and(header("authorization", format!("Bearer {TEST_SECRET}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(keys))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_user(&self, id: &str, first_name: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/users/{id}")))
            .and(header("authorization", format!("Bearer {TEST_SECRET}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": id,
                "object": "user",
                "first_name": first_name,
                "email_addresses": [],
                "phone_numbers": [],
                "public_metadata": {},
                "private_metadata": {},
                "unsafe_metadata": {}
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_user_status(&self, id: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/users/{id}")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }
}
