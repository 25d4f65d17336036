pub mod error;
pub mod http;
pub mod types;

pub use error::ServiceError;
pub use http::HttpClaimService;
pub use types::{ClaimSubmitResult, User};

use crate::credential::Credential;

/// Remote authority for claim status.
///
/// The service is the source of truth: it must hand out at most one `accepted = true`
/// per user, however many submissions race.
pub trait ClaimService: Send + Sync + 'static {
    /// `GET /users/{subjectId}`
    fn fetch_user(
        &self,
        subject_id: &str,
        credential: &Credential,
    ) -> impl Future<Output = Result<User, ServiceError>> + Send;

    /// `PATCH /claim/{userId}/{publicKey}`
    fn submit_claim(
        &self,
        user_id: u64,
        public_key: &str,
        credential: &Credential,
    ) -> impl Future<Output = Result<ClaimSubmitResult, ServiceError>> + Send;
}
