use base64::Engine as _;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while decoding a bearer credential
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum CredentialError {
    #[error("Credential is empty")]
    Empty,

    #[error("Credential must have 3 segments, found {0}")]
    SegmentCount(usize),

    #[error("Credential payload is not base64url")]
    InvalidEncoding,

    #[error("Credential payload has unexpected shape: {0}")]
    InvalidPayload(String),

    #[error("Credential has an empty subject id")]
    EmptySubject,
}

/// Opaque bearer credential issued by the identity provider.
///
/// The token is forwarded verbatim to the faucet service, so `Debug` never prints it.
#[derive(Clone, Eq, PartialEq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token, dropping an optional `Bearer ` prefix
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        let token = match token.trim().strip_prefix("Bearer ") {
            Some(stripped) => stripped.trim().to_string(),
            None => token.trim().to_string(),
        };
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the identity claims embedded in the token
    pub fn decode(&self) -> Result<CredentialClaims, CredentialError> {
        decode(&self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<redacted>").finish()
    }
}

/// Identity claims carried by the credential
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialClaims {
    pub subject_id: String,
    pub public_address: String,
}

#[derive(Deserialize)]
struct TokenBody {
    payload: TokenPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPayload {
    id: SubjectId,
    public_address: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SubjectId {
    Text(String),
    Number(u64),
}

impl From<SubjectId> for String {
    fn from(value: SubjectId) -> Self {
        match value {
            SubjectId::Text(id) => id,
            SubjectId::Number(id) => id.to_string(),
        }
    }
}

/// Decode `header.payload.signature` without verifying the signature.
///
/// The issuer boundary has already validated the token; only the payload is read.
pub fn decode(token: &str) -> Result<CredentialClaims, CredentialError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CredentialError::Empty);
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(CredentialError::SegmentCount(segments.len()));
    }

    // Some issuers keep the padding
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(segments[1])
        .or_else(|_| URL_SAFE.decode(segments[1]))
        .map_err(|_| CredentialError::InvalidEncoding)?;

    let body: TokenBody = serde_json::from_slice(&payload_bytes)
        .map_err(|error| CredentialError::InvalidPayload(error.to_string()))?;

    let subject_id = String::from(body.payload.id).trim().to_string();
    if subject_id.is_empty() {
        return Err(CredentialError::EmptySubject);
    }

    Ok(CredentialClaims {
        subject_id,
        public_address: body.payload.public_address,
    })
}
