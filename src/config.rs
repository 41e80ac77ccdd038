use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, time::Duration};

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Release metadata endpoint; must answer with a JSON object carrying `tag_name`.
    pub release_url: String,
    /// Where `GET /` redirects to.
    pub repository_url: String,
    pub refresh_interval_secs: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl UpstreamConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            release_url: String::from(
                "https://api.github.com/repos/vessel-app/vessel-cli/releases/latest",
            ),
            repository_url: String::from("https://github.com/Vessel-App/vessel-cli"),
            refresh_interval_secs: 5 * 60,
            timeout_secs: 10,
            user_agent: format!("vessel-dist/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Loads the config file at `path`, or the built-in defaults when no path is given.
pub async fn read_config(path: Option<&Path>) -> Result<Config> {
    let Some(config_path) = path else {
        return Ok(Config::default());
    };

    let config_file = tokio::fs::read_to_string(config_path)
        .await
        .with_context(|| format!("failed to read config from path: {}", config_path.display()))?;

    toml::from_str(&config_file).with_context(|| "failed to parse valid config TOML from file")
}
