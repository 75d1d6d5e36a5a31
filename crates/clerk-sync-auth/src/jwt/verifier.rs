//! Session token verification
//!
//! Verification runs against a [`KeySet`] snapshot and performs no I/O once
//! the set is cached:
//!
//! - Fail closed on an empty key set (before the token is even parsed)
//! - Algorithm allow-list (default RS256 only)
//! - Key selection by header `kid`; tokens without a `kid` are tried against
//!   every RSA signing key
//! - Signature, `exp` and `nbf` checks with a small clock-skew leeway
//! - Optional issuer check

use super::KeySetCache;
use crate::metrics::record_verification;
use clerk_sync_types::{KeySet, SessionClaims, SigningKey, VerificationError};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default tolerance for `exp`/`nbf` checks
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(5);

/// Verifies provider session tokens against the cached key set
///
/// # Example
///
/// ```rust
/// # use clerk_sync_auth::jwt::{KeySetCache, TokenVerifier};
/// # use clerk_sync_types::{KeySet, VerificationError};
/// # use std::sync::Arc;
/// # tokio_test::block_on(async {
/// let cache = Arc::new(KeySetCache::with_static_keys(KeySet::empty()));
/// let verifier = TokenVerifier::new(cache);
///
/// // No keys: every token is rejected
/// let result = verifier.verify("eyJhbGciOiJSUzI1NiJ9.e30.sig").await;
/// assert_eq!(result.unwrap_err(), VerificationError::NoKeysConfigured);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    key_cache: Arc<KeySetCache>,
    /// Clock skew tolerance (default: 5 seconds)
    clock_skew: Duration,
    /// Accepted algorithms (default: RS256)
    allowed_algorithms: Vec<Algorithm>,
    /// Expected `iss`, if issuer checking is enabled
    expected_issuer: Option<String>,
}

impl TokenVerifier {
    /// Create a verifier with default settings
    pub fn new(key_cache: Arc<KeySetCache>) -> Self {
        Self {
            key_cache,
            clock_skew: DEFAULT_CLOCK_SKEW,
            allowed_algorithms: vec![Algorithm::RS256],
            expected_issuer: None,
        }
    }

    /// Set clock skew tolerance
    pub fn with_clock_skew(mut self, leeway: Duration) -> Self {
        self.clock_skew = leeway;
        self
    }

    /// Set accepted algorithms
    ///
    /// Keys are RSA, so only the RS* and PS* families can ever verify.
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    /// Require the `iss` claim to equal `issuer`
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    /// The key cache this verifier reads from
    pub fn key_cache(&self) -> &Arc<KeySetCache> {
        &self.key_cache
    }

    /// Verify a token against the current key set, loading it on first use
    ///
    /// # Errors
    ///
    /// Returns a [`VerificationError`] describing why the token was rejected.
    pub async fn verify(&self, token: &str) -> Result<SessionClaims, VerificationError> {
        let keys = self.key_cache.get_keys().await;
        self.verify_with(&keys, token)
    }

    /// Verify, refreshing the key set once if the token names an unknown key
    ///
    /// Use this when the provider may have rotated its keys since the set was
    /// cached. Other failures are returned without a refresh. The refresh is
    /// subject to the cache's minimum refresh interval.
    ///
    /// # Errors
    ///
    /// Returns a [`VerificationError`] describing why the token was rejected.
    pub async fn verify_with_refresh(
        &self,
        token: &str,
    ) -> Result<SessionClaims, VerificationError> {
        match self.verify(token).await {
            Err(VerificationError::UnknownKeyId { kid }) => {
                info!(kid = %kid, "Unknown signing key, refreshing key set");
                let keys = self.key_cache.force_refresh().await;
                self.verify_with(&keys, token)
            }
            result => result,
        }
    }

    /// Verify a token against an explicit key set
    ///
    /// Pure: the same key set and token always give the same result at a
    /// given time.
    ///
    /// # Errors
    ///
    /// Returns a [`VerificationError`] describing why the token was rejected.
    pub fn verify_with(
        &self,
        keys: &KeySet,
        token: &str,
    ) -> Result<SessionClaims, VerificationError> {
        let started = Instant::now();
        let result = self.verify_inner(keys, token);
        record_verification(
            &result.as_ref().map(|_| ()),
            started.elapsed().as_secs_f64(),
        );

        match &result {
            Ok(claims) => debug!(subject = %claims.subject, "Session token verified"),
            Err(e) => debug!(error = %e, "Session token rejected"),
        }
        result
    }

    fn verify_inner(&self, keys: &KeySet, token: &str) -> Result<SessionClaims, VerificationError> {
        if keys.is_empty() {
            return Err(VerificationError::NoKeysConfigured);
        }

        let header = decode_header(token).map_err(|e| VerificationError::Malformed {
            reason: format!("invalid token header: {e}"),
        })?;

        if !self.allowed_algorithms.contains(&header.alg) {
            warn!(
                algorithm = ?header.alg,
                allowed = ?self.allowed_algorithms,
                "Session token algorithm not allowed"
            );
            return Err(VerificationError::InvalidSignature);
        }

        let validation = self.validation(header.alg);

        match header.kid {
            Some(kid) => {
                let key = keys
                    .find(&kid)
                    .ok_or(VerificationError::UnknownKeyId { kid })?;
                decode_with(token, key, &validation)
            }
            None => {
                debug!(key_count = keys.len(), "Token has no kid, trying every signing key");
                let mut last = VerificationError::InvalidSignature;
                for key in keys.iter().filter(|key| key.is_rsa_signing_key()) {
                    match decode_with(token, key, &validation) {
                        Err(VerificationError::InvalidSignature) => {}
                        Err(e @ VerificationError::Malformed { .. }) => last = e,
                        // Signature matched; claim errors are final
                        other => return other,
                    }
                }
                Err(last)
            }
        }
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.leeway = self.clock_skew.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &self.expected_issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }
}

fn decode_with(
    token: &str,
    key: &SigningKey,
    validation: &Validation,
) -> Result<SessionClaims, VerificationError> {
    if !key.is_rsa_signing_key() {
        warn!(kid = %key.key_id, key_type = %key.key_type, "Key is not an RSA signing key");
        return Err(VerificationError::InvalidSignature);
    }

    let decoding_key = DecodingKey::from_rsa_components(&key.modulus, &key.exponent)
        .map_err(|e| {
            warn!(kid = %key.key_id, error = %e, "Unusable signing key");
            VerificationError::InvalidSignature
        })?;

    decode::<SessionClaims>(token, &decoding_key, validation)
        .map(|data| data.claims)
        .map_err(map_jwt_error)
}

fn map_jwt_error(error: JwtError) -> VerificationError {
    match error.kind() {
        ErrorKind::ExpiredSignature => VerificationError::Expired,
        ErrorKind::ImmatureSignature => VerificationError::NotYetValid,
        ErrorKind::InvalidSignature => VerificationError::InvalidSignature,
        ErrorKind::InvalidIssuer => VerificationError::InvalidIssuer,
        ErrorKind::MissingRequiredClaim(claim) => VerificationError::Malformed {
            reason: format!("missing required claim '{claim}'"),
        },
        _ => VerificationError::Malformed {
            reason: error.to_string(),
        },
    }
}
