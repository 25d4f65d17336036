use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix used by the NEAR textual key format
pub const ED25519_PREFIX: &str = "ed25519:";

/// Signature scheme of a generated keypair
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum KeyScheme {
    #[default]
    Ed25519,
}

/// Secret half of an issued keypair, stored without the scheme prefix.
///
/// This is the bearer credential for the wallet account-creation step.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    /// Accepts either `ed25519:<base58>` or the bare base58 body
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        match value.strip_prefix(ED25519_PREFIX) {
            Some(body) => Self(body.to_string()),
            None => Self(value),
        }
    }

    /// Bare base58 body, as persisted and shown to the user
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full `ed25519:<base58>` form
    pub fn to_prefixed(&self) -> String {
        format!("{ED25519_PREFIX}{}", self.0)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretKey").field(&"<redacted>").finish()
    }
}

/// Freshly generated keypair. Only `public_key` is ever sent to the faucet service.
#[derive(Clone, Debug)]
pub struct Keypair {
    pub public_key: String,
    pub secret_key: SecretKey,
}

impl Keypair {
    pub fn generate(scheme: KeyScheme) -> Self {
        match scheme {
            KeyScheme::Ed25519 => {
                let signing_key = SigningKey::generate(&mut OsRng);
                Self::from_signing_key(&signing_key)
            }
        }
    }

    fn from_signing_key(signing_key: &SigningKey) -> Self {
        let public = signing_key.verifying_key().to_bytes();
        // seed || public, the 64-byte layout NEAR tooling expects
        let secret = signing_key.to_keypair_bytes();

        Self {
            public_key: format!("{ED25519_PREFIX}{}", bs58::encode(public).into_string()),
            secret_key: SecretKey(bs58::encode(secret).into_string()),
        }
    }
}

/// Generate a fresh keypair from the OS random source
pub fn generate(scheme: KeyScheme) -> Keypair {
    Keypair::generate(scheme)
}
