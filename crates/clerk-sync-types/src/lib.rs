//! # clerk-sync types
//!
//! Data model shared by the clerk-sync crates:
//!
//! - [`SigningKey`] / [`KeySet`] - the provider's public verification keys
//! - [`SessionClaims`] - the verified payload of a session token
//! - [`UserRecord`] - a directory user, mostly passed through to the UI
//! - [`error`] - verification, directory and configuration failures
//!
//! This crate performs no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod claims;
pub mod error;
pub mod keys;
pub mod user;

pub use claims::SessionClaims;
pub use error::{AuthError, ConfigurationError, DirectoryError, VerificationError};
pub use keys::{KeySet, SigningKey};
pub use user::{EmailAddress, PhoneNumber, UserRecord, Verification};
