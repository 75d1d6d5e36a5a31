//! Verification metrics
//!
//! Enable with the `metrics` feature flag. Requires a `metrics` recorder
//! to be installed (e.g., via `metrics-exporter-prometheus`).
//!
//! ## Metrics Provided
//!
//! - `clerk_sync_verifications_total` - Counter for token verifications (labels: outcome)
//! - `clerk_sync_verification_duration_seconds` - Histogram for verification duration
//! - `clerk_sync_key_set_loads_total` - Counter for key set loads (labels: source)
//! - `clerk_sync_user_fetches_total` - Counter for directory user fetches (labels: status)

use clerk_sync_types::{DirectoryError, UserRecord, VerificationError};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static INIT: Once = Once::new();

/// Where a key set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeySource {
    Static,
    Remote,
    Empty,
}

impl KeySource {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Remote => "remote",
            Self::Empty => "empty",
        }
    }
}

/// Metric label for a verification outcome
#[cfg_attr(not(feature = "metrics"), allow(dead_code))]
pub(crate) fn verification_outcome(result: &Result<(), &VerificationError>) -> &'static str {
    match result {
        Ok(()) => "success",
        Err(VerificationError::Malformed { .. }) => "malformed",
        Err(VerificationError::Expired) => "expired",
        Err(VerificationError::NotYetValid) => "not_yet_valid",
        Err(VerificationError::InvalidSignature) => "invalid_signature",
        Err(VerificationError::UnknownKeyId { .. }) => "unknown_key_id",
        Err(VerificationError::InvalidIssuer) => "invalid_issuer",
        Err(VerificationError::NoKeysConfigured) => "no_keys",
    }
}

#[cfg_attr(not(feature = "metrics"), allow(dead_code))]
fn user_fetch_status(result: &Result<UserRecord, DirectoryError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(DirectoryError::NotFound { .. }) => "not_found",
        Err(DirectoryError::Transport { .. }) => "transport",
        Err(DirectoryError::MalformedResponse { .. }) => "malformed",
    }
}

/// Initialize metric descriptions. Call once at startup.
///
/// Idempotent; only the first call registers the descriptions.
#[cfg(feature = "metrics")]
pub fn init_metrics() {
    INIT.call_once(|| {
        describe_counter!(
            "clerk_sync_verifications_total",
            "Total session token verifications by outcome"
        );
        describe_histogram!(
            "clerk_sync_verification_duration_seconds",
            "Session token verification duration in seconds"
        );
        describe_counter!(
            "clerk_sync_key_set_loads_total",
            "Total key set loads by source"
        );
        describe_counter!(
            "clerk_sync_user_fetches_total",
            "Total directory user fetches by status"
        );
    });
}

#[cfg(feature = "metrics")]
pub(crate) fn record_verification(
    result: &Result<(), &VerificationError>,
    duration_seconds: f64,
) {
    counter!(
        "clerk_sync_verifications_total",
        "outcome" => verification_outcome(result)
    )
    .increment(1);
    histogram!("clerk_sync_verification_duration_seconds").record(duration_seconds);
}

#[cfg(feature = "metrics")]
pub(crate) fn record_key_set_load(source: KeySource) {
    counter!(
        "clerk_sync_key_set_loads_total",
        "source" => source.as_str()
    )
    .increment(1);
}

#[cfg(feature = "metrics")]
pub(crate) fn record_user_fetch(result: &Result<UserRecord, DirectoryError>) {
    counter!(
        "clerk_sync_user_fetches_total",
        "status" => user_fetch_status(result)
    )
    .increment(1);
}

// No-op versions when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
#[allow(missing_docs)]
pub fn init_metrics() {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_verification(
    _result: &Result<(), &VerificationError>,
    _duration_seconds: f64,
) {
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_key_set_load(_source: KeySource) {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_user_fetch(_result: &Result<UserRecord, DirectoryError>) {}
