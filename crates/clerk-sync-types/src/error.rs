//! Error taxonomy
//!
//! Verification and directory failures are values: the session state machine
//! stores them in `AuthState::last_error` (verification) or only logs them
//! (directory) instead of returning them to the caller. Configuration errors
//! are raised once, when the shared components are constructed.

use serde::Serialize;
use thiserror::Error;

/// Failures verifying a session token
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum VerificationError {
    /// Token could not be parsed, or lacks required claims
    #[error("Malformed session token: {reason}")]
    Malformed {
        /// What was wrong with the token
        reason: String,
    },

    /// Token `exp` lies in the past
    #[error("Session token has expired")]
    Expired,

    /// Token `nbf` lies in the future
    #[error("Session token is not valid yet")]
    NotYetValid,

    /// Signature does not verify against the matching key
    #[error("Session token signature is invalid")]
    InvalidSignature,

    /// Token names a key id absent from the current key set
    #[error("Session token signed with unknown key '{kid}'")]
    UnknownKeyId {
        /// The `kid` from the token header
        kid: String,
    },

    /// Token was issued by an unexpected issuer
    #[error("Session token issuer is not accepted")]
    InvalidIssuer,

    /// The key set is empty, so no token can be accepted
    #[error("No verification keys are configured")]
    NoKeysConfigured,
}

/// Failures talking to the provider's REST API
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DirectoryError {
    /// The requested user does not exist
    #[error("User '{user_id}' not found")]
    NotFound {
        /// Requested user id
        user_id: String,
    },

    /// Request failed or returned a non-success status
    #[error("Directory request failed: {message}")]
    Transport {
        /// HTTP status, if a response was received
        status: Option<u16>,
        /// Failure description
        message: String,
    },

    /// Response body could not be decoded
    #[error("Malformed directory response: {message}")]
    MalformedResponse {
        /// Decoding failure description
        message: String,
    },
}

impl DirectoryError {
    /// Transport failure without a response status
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Whether this is a not-found response
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Invalid or incomplete configuration, detected at construction time
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ConfigurationError {
    /// A directory credential is required but none was configured
    #[error("Directory secret key is not configured")]
    MissingCredential,

    /// Neither static keys nor a directory credential were configured
    #[error("No key source configured: set a secret key or static JWT public keys")]
    NoKeySource,

    /// Statically configured keys could not be parsed
    #[error("Invalid static JWT public keys: {reason}")]
    InvalidStaticKeys {
        /// Parse failure description
        reason: String,
    },

    /// Directory base URL is unusable
    #[error("Invalid directory base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The configured URL
        url: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Error attached to a session's authentication state
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "category", content = "error", rename_all = "snake_case")]
pub enum AuthError {
    /// Token verification failed
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Directory access failed
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Configuration is incomplete
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl AuthError {
    /// Short, user-facing explanation suitable for a sign-in fallback view
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Verification(VerificationError::Expired) => {
                "Your session has expired. Please sign in again."
            }
            Self::Verification(VerificationError::NoKeysConfigured)
            | Self::Configuration(_) => "Sign-in is temporarily unavailable.",
            Self::Verification(_) => "We could not verify your session. Please sign in again.",
            Self::Directory(_) => "Your profile could not be loaded.",
        }
    }

    /// The verification error, if this is one
    pub fn as_verification(&self) -> Option<&VerificationError> {
        match self {
            Self::Verification(e) => Some(e),
            _ => None,
        }
    }
}
