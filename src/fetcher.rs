//! Lookup of the latest release tag from the upstream release API.

use crate::{config::UpstreamConfig, store::VersionTag};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no response from upstream: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {status}")]
    Status { status: StatusCode, body: String },

    #[error("malformed release metadata: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("release metadata carried an empty tag_name")]
    EmptyTag,

    #[error("tag_name {0:?} contains characters unsafe to embed in the install script")]
    UnsafeTag(String),
}

/// Anything that can report the latest release tag.
#[async_trait::async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<VersionTag, FetchError>;
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// GitHub's `releases/latest` endpoint.
#[derive(Debug, Clone)]
pub struct GitHubReleases {
    client: reqwest::Client,
    release_url: String,
}

impl GitHubReleases {
    pub fn new(upstream: &UpstreamConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&upstream.user_agent)
            .timeout(upstream.timeout())
            .build()?;

        Ok(Self {
            client,
            release_url: upstream.release_url.clone(),
        })
    }
}

#[async_trait::async_trait]
impl ReleaseSource for GitHubReleases {
    async fn fetch_latest(&self) -> Result<VersionTag, FetchError> {
        trace!("Requesting release metadata from: {}", self.release_url);

        let response = self
            .client
            .get(&self.release_url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 300 {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let body = response.text().await?;
        let release: Release = serde_json::from_str(&body)?;
        if release.tag_name.is_empty() {
            return Err(FetchError::EmptyTag);
        }

        // The tag lands unquoted inside `${1:-...}` in the install script.
        let tag = VersionTag::new(release.tag_name);
        if !tag.is_shell_safe() {
            return Err(FetchError::UnsafeTag(tag.to_string()));
        }

        Ok(tag)
    }
}
