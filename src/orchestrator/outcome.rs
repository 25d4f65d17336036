use crate::credential::CredentialError;
use crate::keypair::SecretKey;
use crate::service::ServiceError;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a claim run ended without a usable secret
#[derive(Debug, Error, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("Malformed credential: {detail}")]
    MalformedCredential { detail: String },

    #[error("Unauthorized, please sign in again")]
    Unauthorized,

    #[error("User not found")]
    NotFound,

    #[error("Faucet service unavailable: {detail}")]
    ServiceUnavailable { detail: String },

    #[error("Claim rejected: {}", .message.as_deref().unwrap_or("no reason given"))]
    ClaimRejected { message: Option<String> },

    #[error("Key not found in the local store. Did you claim it from a different device?")]
    OrphanedClaim,
}

impl FailureReason {
    /// Whether the caller may retry the whole run later
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureReason::ServiceUnavailable { .. })
    }

    pub fn to_status_code(&self) -> StatusCode {
        match self {
            FailureReason::MalformedCredential { .. } => StatusCode::BAD_REQUEST,
            FailureReason::Unauthorized => StatusCode::UNAUTHORIZED,
            FailureReason::NotFound => StatusCode::NOT_FOUND,
            FailureReason::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            FailureReason::ClaimRejected { .. } | FailureReason::OrphanedClaim => {
                StatusCode::CONFLICT
            }
        }
    }
}

impl From<CredentialError> for FailureReason {
    fn from(error: CredentialError) -> Self {
        FailureReason::MalformedCredential {
            detail: error.to_string(),
        }
    }
}

impl From<ServiceError> for FailureReason {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Unauthorized => FailureReason::Unauthorized,
            ServiceError::NotFound => FailureReason::NotFound,
            ServiceError::Unavailable(detail) => FailureReason::ServiceUnavailable { detail },
        }
    }
}

/// The one value a caller gets back from a claim run
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ClaimOutcome {
    ClaimedNow { secret_key: SecretKey },
    ClaimedBefore { secret_key: SecretKey },
    Pending,
    Failed { reason: FailureReason },
}

impl ClaimOutcome {
    pub fn failed(reason: impl Into<FailureReason>) -> Self {
        ClaimOutcome::Failed {
            reason: reason.into(),
        }
    }

    /// Secret to display, if the outcome carries one
    pub fn secret_key(&self) -> Option<&SecretKey> {
        match self {
            ClaimOutcome::ClaimedNow { secret_key } | ClaimOutcome::ClaimedBefore { secret_key } => {
                Some(secret_key)
            }
            ClaimOutcome::Pending | ClaimOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ClaimOutcome::Failed { .. })
    }

    /// User-facing line shown next to the outcome
    pub fn message(&self) -> String {
        match self {
            ClaimOutcome::ClaimedNow { .. } => {
                "Next, create an account in the NEAR Wallet:".to_string()
            }
            ClaimOutcome::ClaimedBefore { .. } => "Already claimed! Continue below:".to_string(),
            ClaimOutcome::Pending => "Claiming...".to_string(),
            ClaimOutcome::Failed { reason } => reason.to_string(),
        }
    }

    pub fn to_status_code(&self) -> StatusCode {
        match self {
            ClaimOutcome::ClaimedNow { .. } | ClaimOutcome::ClaimedBefore { .. } => StatusCode::OK,
            ClaimOutcome::Pending => StatusCode::ACCEPTED,
            ClaimOutcome::Failed { reason } => reason.to_status_code(),
        }
    }
}
