use super::{ClaimService, ClaimSubmitResult, ServiceError, User};
use crate::credential::Credential;
use anyhow::{Result, anyhow};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, warn};

/// `ClaimService` backed by the faucet HTTP API
#[derive(Debug, Clone)]
pub struct HttpClaimService {
    client: Client,
    base_url: Url,
}

impl HttpClaimService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|error| anyhow!("Invalid backend URL {base_url}: {error}"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Backend URL {base_url} cannot be a base"));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Append percent-encoded path segments to the base URL
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn bearer(credential: &Credential) -> String {
        format!("Bearer {}", credential.as_str())
    }
}

/// Map the common failure statuses; `None` means the caller decides
fn classify(status: StatusCode) -> Option<ServiceError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(ServiceError::Unauthorized),
        StatusCode::NOT_FOUND => Some(ServiceError::NotFound),
        status if status.is_server_error() => Some(ServiceError::Unavailable(format!(
            "faucet service returned {status}"
        ))),
        _ => None,
    }
}

async fn read_user(response: Response) -> Result<User, ServiceError> {
    let status = response.status();
    if let Some(error) = classify(status) {
        return Err(error);
    }
    if !status.is_success() {
        return Err(ServiceError::Unavailable(format!(
            "unexpected status {status}"
        )));
    }

    Ok(response.json::<User>().await?)
}

async fn read_submit_result(response: Response) -> Result<ClaimSubmitResult, ServiceError> {
    let status = response.status();
    if let Some(error) = classify(status) {
        return Err(error);
    }
    if status.is_success() {
        return Ok(response.json::<ClaimSubmitResult>().await?);
    }

    // Other 4xx: the service refused the claim, keep its explanation when it sent one
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ClaimSubmitResult>(&body) {
        Ok(result) if !result.accepted => Ok(result),
        _ => Ok(ClaimSubmitResult::rejected(format!(
            "claim refused with status {status}"
        ))),
    }
}

impl ClaimService for HttpClaimService {
    async fn fetch_user(
        &self,
        subject_id: &str,
        credential: &Credential,
    ) -> Result<User, ServiceError> {
        let url = self.endpoint(&["users", subject_id]);
        debug!(subject_id, %url, "Fetching user");

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, Self::bearer(credential))
            .send()
            .await
            .inspect_err(|error| warn!(subject_id, ?error, "Fetch user request failed"))?;

        read_user(response).await
    }

    async fn submit_claim(
        &self,
        user_id: u64,
        public_key: &str,
        credential: &Credential,
    ) -> Result<ClaimSubmitResult, ServiceError> {
        let user_id_segment = user_id.to_string();
        let url = self.endpoint(&["claim", &user_id_segment, public_key]);
        debug!(user_id, public_key, "Submitting claim");

        let response = self
            .client
            .patch(url)
            .header(AUTHORIZATION, Self::bearer(credential))
            .header(CONTENT_TYPE, "application/json")
            .body("")
            .send()
            .await
            .inspect_err(|error| warn!(user_id, ?error, "Submit claim request failed"))?;

        read_submit_result(response).await
    }
}
