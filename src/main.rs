use faucet_claim::{Config, claim_once, run};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load()?;

    if let Some(token) = &config.token {
        let response = claim_once(&config, token).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    info!(backend_url = ?config.backend_url, workspace = %config.workspace, "Starting faucet claim API");
    run(config).await
}
