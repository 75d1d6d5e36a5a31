//! Key set caching and rotation against the HTTP directory
//!
//! Tests cover:
//! - lazy single load from `/jwks`
//! - endpoint failure leaves the verifier failing closed
//! - rotation picked up by `verify_with_refresh`
//! - readers during a refresh observe a complete old or new set
//! - a failed or rate-limited refresh keeps the cached keys

mod common;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use clerk_sync_auth::testutil::{PRIMARY_KEY, ROTATED_KEY, TokenBuilder, test_key_set};
use clerk_sync_auth::{KeySetCache, TokenVerifier};
use clerk_sync_types::{KeySet, VerificationError};
use common::MockClerkApi;
use std::sync::Arc;
use std::time::Duration;
use wiremock::ResponseTemplate;

fn cache_for(api: &MockClerkApi) -> KeySetCache {
    KeySetCache::with_directory(Arc::new(api.client())).with_min_refresh_interval(Duration::ZERO)
}

fn verifier_for(api: &MockClerkApi) -> TokenVerifier {
    TokenVerifier::new(Arc::new(cache_for(api)))
}

#[tokio::test]
async fn test_keys_fetched_once_and_reused() {
    // GIVEN: API publishing the primary key, expecting exactly one fetch
    let api = MockClerkApi::start().await;
    let keys = KeySet::new(vec![PRIMARY_KEY.signing_key()]);
    api.mock_jwks(&keys).await;
    let verifier = verifier_for(&api);

    // WHEN: Verifying several tokens
    for subject in ["user_a", "user_b", "user_c"] {
        let claims = verifier.verify(&PRIMARY_KEY.token(subject)).await.unwrap();
        assert_eq!(claims.subject(), subject);
    }

    // THEN: One request reached the endpoint
    let requests = api.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_unreachable_endpoint_fails_closed() {
    // GIVEN: Key endpoint down
    let api = MockClerkApi::start().await;
    api.mock_jwks_response(ResponseTemplate::new(500)).await;
    let verifier = verifier_for(&api);

    // WHEN: Verifying a correctly signed token
    let result = verifier.verify(&PRIMARY_KEY.token("user_1")).await;

    // THEN: Rejected because no keys are available
    assert_eq!(result.unwrap_err(), VerificationError::NoKeysConfigured);
}

#[tokio::test]
async fn test_rotation_recovered_by_refresh() {
    // GIVEN: First fetch returns only the primary key, later fetches both
    let api = MockClerkApi::start().await;
    api.mock_jwks_times(&KeySet::new(vec![PRIMARY_KEY.signing_key()]), 1)
        .await;
    api.mock_jwks(&test_key_set()).await;
    let verifier = verifier_for(&api);
    verifier.verify(&PRIMARY_KEY.token("user_1")).await.unwrap();

    // WHEN: A token signed with the rotated key arrives
    let token = ROTATED_KEY.token("user_1");
    let plain = verifier.verify(&token).await;
    let refreshed = verifier.verify_with_refresh(&token).await;

    // THEN: Plain verification names the unknown key; refresh recovers
    assert_eq!(
        plain.unwrap_err(),
        VerificationError::UnknownKeyId {
            kid: ROTATED_KEY.kid.to_string()
        }
    );
    assert_eq!(refreshed.unwrap().subject(), "user_1");
    assert_eq!(
        verifier.key_cache().snapshot().unwrap().key_ids(),
        vec![PRIMARY_KEY.kid, ROTATED_KEY.kid]
    );
}

#[tokio::test]
async fn test_rate_limited_refresh_keeps_cached_keys() {
    // GIVEN: Keys served once, then the endpoint answers 429
    let api = MockClerkApi::start().await;
    api.mock_jwks_times(&test_key_set(), 1).await;
    api.mock_jwks_response(ResponseTemplate::new(429)).await;
    let verifier = verifier_for(&api);
    let token = PRIMARY_KEY.token("user_1");
    verifier.verify(&token).await.unwrap();

    // WHEN: A refresh runs while the provider is rate limiting
    let keys = verifier.key_cache().force_refresh().await;

    // THEN: The cached set survives and tokens keep verifying
    assert_eq!(keys.len(), 2);
    assert_eq!(verifier.verify(&token).await.unwrap().subject(), "user_1");
    assert_eq!(
        verifier.verify_with_refresh(&token).await.unwrap().subject(),
        "user_1"
    );
    assert_eq!(api.server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unsigned_token_rejected() {
    // GIVEN: A token claiming `alg: none` and a known kid
    let api = MockClerkApi::start().await;
    api.mock_jwks(&test_key_set()).await;
    let verifier = verifier_for(&api);

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","kid":"ins_test_1"}"#);
    let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"user_admin","exp":99999999999}"#);
    let token = format!("{header}.{payload}.");

    // WHEN/THEN: Rejected as malformed (no such algorithm)
    assert!(matches!(
        verifier.verify(&token).await.unwrap_err(),
        VerificationError::Malformed { .. }
    ));
}

#[tokio::test]
async fn test_symmetric_algorithm_rejected() {
    // GIVEN: An HS256 token whose secret is the public modulus (key confusion attempt)
    let api = MockClerkApi::start().await;
    api.mock_jwks(&test_key_set()).await;
    let verifier = verifier_for(&api);

    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
    header.kid = Some(PRIMARY_KEY.kid.to_string());
    let token = jsonwebtoken::encode(
        &header,
        &serde_json::json!({"sub": "user_admin", "exp": 99_999_999_999u64}),
        &jsonwebtoken::EncodingKey::from_secret(PRIMARY_KEY.modulus.as_bytes()),
    )
    .unwrap();

    // WHEN/THEN: Algorithm outside the allow-list
    assert_eq!(
        verifier.verify(&token).await.unwrap_err(),
        VerificationError::InvalidSignature
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_complete_sets_during_refresh() {
    // GIVEN: Cache populated with the primary key; API now publishes both
    let api = MockClerkApi::start().await;
    api.mock_jwks_times(&KeySet::new(vec![PRIMARY_KEY.signing_key()]), 1)
        .await;
    api.mock_jwks(&test_key_set()).await;
    let cache = Arc::new(cache_for(&api));
    cache.get_keys().await;

    // WHEN: Readers snapshot while refreshes run
    let readers: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..200 {
                    let keys = cache.get_keys().await;
                    seen.push(keys.len());
                    tokio::task::yield_now().await;
                }
                seen
            })
        })
        .collect();
    for _ in 0..5 {
        cache.force_refresh().await;
    }

    // THEN: Every observed set is exactly the old or the new one
    for reader in readers {
        for len in reader.await.unwrap() {
            assert!(len == 1 || len == 2, "observed partial key set of {len}");
        }
    }
    assert_eq!(cache.snapshot().unwrap().len(), 2);
}

#[tokio::test]
async fn test_token_builder_defaults_verify() {
    // Sanity check for the shared token helpers
    let verifier = TokenVerifier::new(Arc::new(KeySetCache::with_static_keys(test_key_set())));
    let token = TokenBuilder::new(&ROTATED_KEY, "user_9")
        .claim("org_id", serde_json::json!("org_1"))
        .sign();

    let claims = verifier.verify(&token).await.unwrap();
    assert_eq!(claims.claim("org_id"), Some(&serde_json::json!("org_1")));
}
