pub mod api;
pub mod app_state;
pub mod cache;
pub mod config;
pub mod credential;
pub mod keypair;
pub mod orchestrator;
pub mod service;

use axum::Router;
use axum::extract::Extension;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tracing::info;

//
// Re-export
//
pub use api::{ClaimResponse, InFlight, claim, health, log_request_errors};
pub use app_state::AppState;
pub use cache::{CLAIMS_FILE, CacheError, ClaimCache, PutOutcome};
pub use config::Config;
pub use credential::{Credential, CredentialClaims, CredentialError};
pub use keypair::{ED25519_PREFIX, KeyScheme, Keypair, SecretKey};
pub use orchestrator::{ClaimOrchestrator, ClaimOutcome, ClaimRun, FailureReason};
pub use service::{ClaimService, ClaimSubmitResult, HttpClaimService, ServiceError, User};

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/claim", post(claim))
        .route("/health", get(health))
        .layer(axum::middleware::from_fn(log_request_errors))
        .layer(cors)
        .layer(Extension(state))
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = AppState::new(&config).await?;
    let app = router(state);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Claim API listening on {addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Run one claim workflow for `token` without starting the server
pub async fn claim_once(config: &Config, token: &str) -> anyhow::Result<ClaimResponse> {
    let state = AppState::new(config).await?;
    let run = state.orchestrator.run(&Credential::new(token)).await;
    Ok(ClaimResponse::from_run(&run, &state.wallet_claim_url))
}
