//! Provider signing keys and key sets
//!
//! A [`KeySet`] is the provider's published JWKS restricted to the members the
//! verifier needs. Sets are never patched in place: a refresh produces a new
//! set that replaces the old one as a whole.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// One public verification key, as published in the provider's JWKS.
///
/// Field names follow RFC 7517 on the wire (`kty`, `use`, `kid`, `n`, `e`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    /// Key type (`kty`), `RSA` for every key the provider issues today
    #[serde(rename = "kty")]
    pub key_type: String,

    /// Public key use (`use`), `sig` for signing keys
    #[serde(rename = "use", default = "default_usage")]
    pub usage: String,

    /// Key identifier (`kid`) matched against the token header
    #[serde(rename = "kid")]
    pub key_id: String,

    /// RSA modulus, base64url without padding
    #[serde(rename = "n")]
    pub modulus: String,

    /// RSA public exponent, base64url without padding
    #[serde(rename = "e")]
    pub exponent: String,

    /// Algorithm hint (`alg`), informational only
    #[serde(rename = "alg", default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

fn default_usage() -> String {
    "sig".to_string()
}

impl SigningKey {
    /// Create an RSA signing key from its JWK components
    pub fn rsa(
        key_id: impl Into<String>,
        modulus: impl Into<String>,
        exponent: impl Into<String>,
    ) -> Self {
        Self {
            key_type: "RSA".to_string(),
            usage: default_usage(),
            key_id: key_id.into(),
            modulus: modulus.into(),
            exponent: exponent.into(),
            algorithm: Some("RS256".to_string()),
        }
    }

    /// Whether this key can verify RSA signatures
    pub fn is_rsa_signing_key(&self) -> bool {
        self.key_type == "RSA" && self.usage == "sig"
    }
}

/// The provider's set of public verification keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    /// Keys in publication order (order carries no meaning)
    pub keys: Vec<SigningKey>,
}

/// Accepted shapes for a statically configured key set
#[derive(Deserialize)]
#[serde(untagged)]
enum KeySetDocument {
    Jwks(KeySet),
    List(Vec<SigningKey>),
    Single(SigningKey),
}

impl KeySet {
    /// Create a key set from a list of keys
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }

    /// An empty key set; verification against it always fails closed
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a statically configured key set.
    ///
    /// Accepts a JWKS document (`{"keys": [...]}`), a bare JSON array of keys,
    /// or a single key object. Blank input yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidStaticKeys`] if the text is not one
    /// of the accepted shapes.
    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::empty());
        }

        let document: KeySetDocument =
            serde_json::from_str(text).map_err(|e| ConfigurationError::InvalidStaticKeys {
                reason: e.to_string(),
            })?;

        Ok(match document {
            KeySetDocument::Jwks(set) => set,
            KeySetDocument::List(keys) => Self::new(keys),
            KeySetDocument::Single(key) => Self::new(vec![key]),
        })
    }

    /// Whether the set holds no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of keys in the set
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Find a key by its `kid`
    pub fn find(&self, key_id: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|key| key.key_id == key_id)
    }

    /// Identifiers of every key in the set
    pub fn key_ids(&self) -> Vec<&str> {
        self.keys.iter().map(|key| key.key_id.as_str()).collect()
    }

    /// Iterate over the keys
    pub fn iter(&self) -> std::slice::Iter<'_, SigningKey> {
        self.keys.iter()
    }
}

impl<'a> IntoIterator for &'a KeySet {
    type Item = &'a SigningKey;
    type IntoIter = std::slice::Iter<'a, SigningKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

impl FromIterator<SigningKey> for KeySet {
    fn from_iter<I: IntoIterator<Item = SigningKey>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
