//! Authenticated client for the repository hosting REST API

use crate::config::is_path_segment;
use crate::errors::{Result, StatusError};
use crate::token::TokenManager;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use tracing::debug;

/// Paginated response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub pagelen: Option<u32>,
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

/// A single commit as reported by the hosting API
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Commit {
    pub hash: String,

    /// Author timestamp in the committer's offset; `None` if absent or unparseable
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub date: Option<DateTime<FixedOffset>>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()))
}

/// Anything that can list the commits of a repository
#[async_trait]
pub trait CommitSource: Send + Sync {
    async fn fetch_commits(&self, repository: &str) -> Result<Vec<Commit>>;
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    account: String,
    tokens: Arc<TokenManager>,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String, account: String, tokens: Arc<TokenManager>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account,
            tokens,
        }
    }

    /// Fetch any resource under the account's repository namespace
    pub async fn get<T: DeserializeOwned>(&self, relative_path: &str) -> Result<T> {
        let url = format!(
            "{}/repositories/{}/{}",
            self.base_url,
            self.account,
            relative_path.trim_start_matches('/')
        );
        self.get_json(&url).await
    }

    /// First page of commits for `repository`. Later pages are not followed.
    pub async fn commits(&self, repository: &str) -> Result<Page<Commit>> {
        if !is_path_segment(repository) {
            return Err(StatusError::Api(format!(
                "repository '{}' is not a valid path segment",
                repository
            )));
        }

        let url = format!(
            "{}/repositories/{}/{}/commits",
            self.base_url, self.account, repository
        );
        let page: Page<Commit> = self.get_json(&url).await?;

        if let Some(next) = &page.next {
            debug!("Ignoring further commit pages of '{}' (next: {})", repository, next);
        }

        Ok(page)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self.tokens.bearer_token().await?;

        debug!("GET {}", url);
        let response = self.client.get(url).bearer_auth(token).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(StatusError::Api(format!(
                "GET {} returned {}: {}",
                url, status, body
            )));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl CommitSource for ApiClient {
    async fn fetch_commits(&self, repository: &str) -> Result<Vec<Commit>> {
        Ok(self.commits(repository).await?.values)
    }
}
