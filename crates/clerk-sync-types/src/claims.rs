//! Verified session token claims

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Decoded and verified payload of a provider session token.
///
/// Only `sub`, `iat` and `exp` are typed. Every other claim (`iss`, `azp`,
/// `sid`, `nbf`, claims injected by JWT templates) is kept verbatim in
/// [`additional`](Self::additional) and is not interpreted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (`sub`): the provider's user identifier
    #[serde(rename = "sub")]
    pub subject: String,

    /// Issued at (`iat`), Unix seconds
    #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<u64>,

    /// Expiration time (`exp`), Unix seconds
    #[serde(rename = "exp")]
    pub expires_at: u64,

    /// All remaining claims, passed through untouched
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

impl SessionClaims {
    /// Create claims with no additional members
    pub fn new(subject: impl Into<String>, issued_at: Option<u64>, expires_at: u64) -> Self {
        Self {
            subject: subject.into(),
            issued_at,
            expires_at,
            additional: HashMap::new(),
        }
    }

    /// The provider user id (`sub`)
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// When the token was issued (`None` if absent or out of range)
    pub fn issued_at(&self) -> Option<SystemTime> {
        self.issued_at.and_then(unix_time)
    }

    /// When the token expires
    ///
    /// `None` if `exp` lies beyond what [`SystemTime`] can represent; such a
    /// token never expires in practice.
    pub fn expires_at(&self) -> Option<SystemTime> {
        unix_time(self.expires_at)
    }

    /// Whether `exp` lies at or before `now`
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now.duration_since(UNIX_EPOCH)
            .is_ok_and(|elapsed| Duration::from_secs(self.expires_at) <= elapsed)
    }

    /// Look up a custom claim by name
    pub fn claim(&self, name: &str) -> Option<&serde_json::Value> {
        self.additional.get(name)
    }

    /// Provider session id (`sid`), if the token carries one
    pub fn session_id(&self) -> Option<&str> {
        self.claim("sid").and_then(serde_json::Value::as_str)
    }

    /// The complete claims mapping as JSON
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn unix_time(secs: u64) -> Option<SystemTime> {
    UNIX_EPOCH.checked_add(Duration::from_secs(secs))
}
