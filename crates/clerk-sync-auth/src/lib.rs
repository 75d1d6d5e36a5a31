//! # clerk-sync auth
//!
//! Session token verification against the identity provider's published keys.
//!
//! ## Components
//!
//! - [`KeySetCache`] - process-wide cache of the provider's signing keys,
//!   sourced from static configuration or the provider directory
//! - [`TokenVerifier`] - verifies session tokens (RS256) against the cache
//! - [`RemoteDirectory`] - seam for the provider's REST API, implemented over
//!   HTTP by [`HttpDirectoryClient`]
//!
//! ## Features
//!
//! - `metrics` - record verification and directory counters via the `metrics` crate
//! - `test-utils` - fixed RSA test keys, token signing and an in-memory directory
//!
//! ## Example
//!
//! ```rust,no_run
//! use clerk_sync_auth::{HttpDirectoryClient, DirectoryConfig, KeySetCache, TokenVerifier};
//! use secrecy::SecretString;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let directory = HttpDirectoryClient::new(DirectoryConfig::new(SecretString::new(
//!     "sk_live_...".to_string(),
//! )))?;
//! let cache = Arc::new(KeySetCache::with_directory(Arc::new(directory)));
//! let verifier = TokenVerifier::new(cache);
//!
//! let claims = verifier.verify("eyJhbGciOiJSUzI1NiIsImtpZCI6...").await?;
//! println!("signed in as {}", claims.subject());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod directory;
pub mod jwt;
mod metrics;

#[cfg(any(test, feature = "test-utils"))]
pub mod testutil;

pub use directory::{DirectoryConfig, HttpDirectoryClient, RemoteDirectory};
pub use jwt::{KeySetCache, TokenVerifier};
pub use metrics::init_metrics;
