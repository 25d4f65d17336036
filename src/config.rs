use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure that can be loaded from CLI or a config file
///
/// Example configuration file content
/// # Faucet Claim Configuration
///
/// # Server configuration
/// listen_on_port = 32146
/// bind_address = "127.0.0.1"
/// workspace = "./data"
///
/// # Faucet service
/// backend_url = "https://faucet.example.com/api"
/// request_timeout_secs = 10
///
/// # Wallet link shown after a claim
/// wallet_claim_url = "https://wallet.near.org/create/"
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, default_value_t = 32146)]
    #[serde(default = "default_port")]
    pub listen_on_port: u16,

    /// Address to bind the HTTP server to
    #[arg(short, long, default_value = "127.0.0.1")]
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Base URL of the faucet claim service
    #[arg(short = 'u', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,

    /// Working directory holding the claim cache
    #[arg(short = 'w', long, default_value = ".")]
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Timeout for each request to the faucet service, in seconds
    #[arg(long, default_value_t = 10)]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Wallet page the secret key is appended to
    #[arg(long, default_value = "https://wallet.near.org/create/")]
    #[serde(default = "default_wallet_claim_url")]
    pub wallet_claim_url: String,

    /// Run a single claim with this credential, print the outcome and exit
    #[arg(long)]
    #[serde(skip)]
    pub token: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_on_port: default_port(),
            bind_address: default_bind_address(),
            backend_url: None,
            workspace: default_workspace(),
            request_timeout_secs: default_request_timeout_secs(),
            wallet_claim_url: default_wallet_claim_url(),
            token: None,
            config: None,
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> Result<Self> {
        let mut config = Config::parse();

        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        // If CLI value is default, use file value
        if self.listen_on_port == default_port() {
            self.listen_on_port = file_config.listen_on_port;
        }
        if self.bind_address == default_bind_address() {
            self.bind_address = file_config.bind_address;
        }
        if self.workspace == default_workspace() {
            self.workspace = file_config.workspace;
        }
        if self.request_timeout_secs == default_request_timeout_secs() {
            self.request_timeout_secs = file_config.request_timeout_secs;
        }
        if self.wallet_claim_url == default_wallet_claim_url() {
            self.wallet_claim_url = file_config.wallet_claim_url;
        }

        if self.backend_url.is_none() {
            self.backend_url = file_config.backend_url;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let Some(backend_url) = self.backend_url.as_deref() else {
            return Err(anyhow::anyhow!("Faucet backend URL is required"));
        };
        if !is_http_url(backend_url) {
            return Err(anyhow::anyhow!(
                "Backend URL must start with http:// or https://"
            ));
        }

        if !is_http_url(&self.wallet_claim_url) {
            return Err(anyhow::anyhow!(
                "Wallet claim URL must start with http:// or https://"
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Request timeout must be greater than zero"));
        }

        if self.bind_address.is_empty() {
            return Err(anyhow::anyhow!("Bind address cannot be empty"));
        }

        if let Some(token) = &self.token {
            if token.trim().is_empty() {
                return Err(anyhow::anyhow!("Token cannot be empty"));
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.listen_on_port)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

// Default value functions
fn default_port() -> u16 {
    32146
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_workspace() -> String {
    ".".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_wallet_claim_url() -> String {
    "https://wallet.near.org/create/".to_string()
}
