use crate::AppState;
use crate::credential::Credential;
use crate::orchestrator::{ClaimOutcome, ClaimRun, FailureReason};
use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

/// Body returned to the front-end for every claim request
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub outcome: ClaimOutcome,
    pub message: String,
    pub retryable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_address: Option<String>,

    /// Wallet link that turns the secret into an account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_url: Option<String>,
}

impl ClaimResponse {
    pub fn new(
        outcome: ClaimOutcome,
        public_address: Option<String>,
        wallet_claim_url: &str,
    ) -> Self {
        let wallet_url = outcome
            .secret_key()
            .map(|secret_key| format!("{wallet_claim_url}{}", secret_key.as_str()));
        let retryable = matches!(&outcome, ClaimOutcome::Failed { reason } if reason.is_retryable());

        Self {
            message: outcome.message(),
            retryable,
            public_address,
            wallet_url,
            outcome,
        }
    }

    pub fn from_run(run: &ClaimRun, wallet_claim_url: &str) -> Self {
        Self::new(
            run.outcome.clone(),
            run.public_address().map(str::to_string),
            wallet_claim_url,
        )
    }

    pub fn status_code(&self) -> StatusCode {
        self.outcome.to_status_code()
    }
}

/// Pull the credential out of `Authorization: Bearer <token>`
fn bearer_credential(headers: &HeaderMap) -> Option<Credential> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(Credential::new(token))
}

/// `POST /claim`: run the claim workflow for the bearer of the credential
pub async fn claim(Extension(state): Extension<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let Some(credential) = bearer_credential(&headers) else {
        warn!("Missing or invalid Authorization header");
        let response = ClaimResponse::new(
            ClaimOutcome::failed(FailureReason::Unauthorized),
            None,
            &state.wallet_claim_url,
        );
        return (response.status_code(), Json(response));
    };

    // Decoded only for the in-flight key; an undecodable credential skips the check and
    // `run` reports it as malformed without touching the network
    let _guard = match credential.decode() {
        Ok(claims) => match state.in_flight.try_begin(&claims.subject_id) {
            Some(guard) => Some(guard),
            None => {
                info!(subject_id = %claims.subject_id, "Claim already in progress");
                let response = ClaimResponse::new(
                    ClaimOutcome::Pending,
                    Some(claims.public_address),
                    &state.wallet_claim_url,
                );
                return (response.status_code(), Json(response));
            }
        },
        Err(_) => None,
    };

    let run = state.orchestrator.run(&credential).await;
    let response = ClaimResponse::from_run(&run, &state.wallet_claim_url);
    (response.status_code(), Json(response))
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
