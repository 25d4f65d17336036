use thiserror::Error;

/// Failures talking to the faucet service
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ServiceError {
    #[error("Credential rejected by faucet service")]
    Unauthorized,

    #[error("User not found")]
    NotFound,

    #[error("Faucet service unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ServiceError::Unavailable("request timed out".to_string())
        } else if error.is_decode() {
            ServiceError::Unavailable(format!("invalid response body: {error}"))
        } else {
            ServiceError::Unavailable(error.to_string())
        }
    }
}
