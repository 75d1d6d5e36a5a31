//! Directory user records
//!
//! The provider's user resource is large. Only `id` matters to the session
//! engine; the commonly rendered fields are typed for convenience and every
//! other member is carried in `extra` so nothing is lost on the way to the UI.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Verification status of an email address or phone number
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    /// Verification strategy (`email_code`, `oauth_google`, ...)
    #[serde(default)]
    pub strategy: Option<String>,
    /// `unverified`, `verified`, `transferable`, `failed` or `expired`
    #[serde(default)]
    pub status: Option<String>,
    /// Attempts made so far
    #[serde(default)]
    pub attempts: Option<u32>,
    /// Unix timestamp after which the verification expires
    #[serde(default)]
    pub expire_at: Option<i64>,
}

impl Verification {
    /// Whether the provider reports this identifier as verified
    pub fn is_verified(&self) -> bool {
        self.status.as_deref() == Some("verified")
    }
}

/// An email address attached to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Identifier of this email address
    pub id: String,
    /// The address itself
    pub email_address: String,
    /// Verification details
    #[serde(default)]
    pub verification: Option<Verification>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A phone number attached to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneNumber {
    /// Identifier of this phone number
    pub id: String,
    /// E.164 formatted number
    pub phone_number: String,
    /// Verification details
    #[serde(default)]
    pub verification: Option<Verification>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A user as returned by `GET /users/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Provider user id; equals the `sub` claim of the user's session tokens
    pub id: String,

    /// Object type, `user`
    #[serde(default)]
    pub object: Option<String>,

    /// Application-assigned external identifier
    #[serde(default)]
    pub external_id: Option<String>,

    /// Username
    #[serde(default)]
    pub username: Option<String>,

    /// First name
    #[serde(default)]
    pub first_name: Option<String>,

    /// Last name
    #[serde(default)]
    pub last_name: Option<String>,

    /// Profile image URL
    #[serde(default)]
    pub image_url: Option<String>,

    /// Whether the user uploaded an image (false means a generated avatar)
    #[serde(default)]
    pub has_image: bool,

    /// Id of the primary entry in `email_addresses`
    #[serde(default)]
    pub primary_email_address_id: Option<String>,

    /// Id of the primary entry in `phone_numbers`
    #[serde(default)]
    pub primary_phone_number_id: Option<String>,

    /// All email addresses, including the primary
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,

    /// All phone numbers, including the primary
    #[serde(default)]
    pub phone_numbers: Vec<PhoneNumber>,

    /// Readable from the frontend, writable only from the backend
    #[serde(default)]
    pub public_metadata: HashMap<String, serde_json::Value>,

    /// Backend-only metadata
    #[serde(default)]
    pub private_metadata: HashMap<String, serde_json::Value>,

    /// Frontend-writable metadata
    #[serde(default)]
    pub unsafe_metadata: HashMap<String, serde_json::Value>,

    /// Unix milliseconds of the last sign-in
    #[serde(default)]
    pub last_sign_in_at: Option<i64>,

    /// Whether the user is banned
    #[serde(default)]
    pub banned: bool,

    /// Whether the user is locked
    #[serde(default)]
    pub locked: bool,

    /// Every other member of the resource
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl UserRecord {
    /// A record carrying only an id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: Some("user".to_string()),
            external_id: None,
            username: None,
            first_name: None,
            last_name: None,
            image_url: None,
            has_image: false,
            primary_email_address_id: None,
            primary_phone_number_id: None,
            email_addresses: Vec::new(),
            phone_numbers: Vec::new(),
            public_metadata: HashMap::new(),
            private_metadata: HashMap::new(),
            unsafe_metadata: HashMap::new(),
            last_sign_in_at: None,
            banned: false,
            locked: false,
            extra: HashMap::new(),
        }
    }

    /// The primary email address, if one is set
    pub fn primary_email(&self) -> Option<&EmailAddress> {
        let primary = self.primary_email_address_id.as_deref()?;
        self.email_addresses.iter().find(|email| email.id == primary)
    }

    /// First and last name joined, if either is present
    pub fn full_name(&self) -> Option<String> {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(name), None) | (None, Some(name)) => Some(name.to_string()),
            (None, None) => None,
        }
    }
}
