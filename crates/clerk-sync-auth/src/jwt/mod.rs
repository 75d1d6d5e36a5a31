//! Session token (JWT) verification
//!
//! - [`KeySetCache`] - lazily loaded, atomically replaced provider signing keys
//! - [`TokenVerifier`] - RS256 verification of session tokens against the cache

mod key_set;
mod verifier;

pub use jsonwebtoken::Algorithm;
pub use key_set::{DEFAULT_MIN_REFRESH_INTERVAL, KeySetCache};
pub use verifier::{DEFAULT_CLOCK_SKEW, TokenVerifier};
