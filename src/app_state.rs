use crate::api::InFlight;
use crate::cache::ClaimCache;
use crate::config::Config;
use crate::orchestrator::ClaimOrchestrator;
use crate::service::HttpClaimService;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ClaimOrchestrator<HttpClaimService>>,
    pub in_flight: InFlight,
    pub wallet_claim_url: String,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let backend_url = config
            .backend_url
            .as_deref()
            .context("Faucet backend URL is required")?;
        let service = HttpClaimService::new(backend_url, config.request_timeout())?;

        let workspace = Path::new(&config.workspace);
        let cache = ClaimCache::open(workspace)
            .await
            .with_context(|| format!("Failed to open claim cache in {}", workspace.display()))?;
        info!(cache = %cache.path().display(), backend_url, "Claim state initialized");

        Ok(Self::from_parts(
            ClaimOrchestrator::new(service, cache),
            config.wallet_claim_url.clone(),
        ))
    }

    pub fn from_parts(
        orchestrator: ClaimOrchestrator<HttpClaimService>,
        wallet_claim_url: String,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            in_flight: InFlight::default(),
            wallet_claim_url,
        }
    }
}
