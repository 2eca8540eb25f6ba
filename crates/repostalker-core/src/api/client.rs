//! HTTP client for the GitHub REST API.
//!
//! `GithubClient` fetches profiles, follower and org member listings, and
//! downloads avatar images. No authentication is performed, so requests are
//! subject to GitHub's anonymous rate limit.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::{Member, UserProfile};

use super::{ApiError, RemoteSource};

// ============================================================================
// Constants
// ============================================================================

/// Default base URL for the GitHub REST API
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Media type requested from every JSON endpoint
const GITHUB_V3_JSON: &str = "application/vnd.github.v3+json";

/// GitHub rejects requests without a User-Agent
const USER_AGENT: &str = concat!("repostalker/", env!("CARGO_PKG_VERSION"));

/// Referer attached to every request so the traffic is attributable
const REFERER: &str = "app://repostalker";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// GitHub API client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    base_url: String,
}

impl GithubClient {
    /// Create a client against the public GitHub API
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_API_BASE_URL)
    }

    /// Create a client against a different API root (GitHub Enterprise, test servers)
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::REFERER, header::HeaderValue::from_static(REFERER));

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a GET request, backing off and retrying while rate limited.
    async fn send_get(&self, url: &str, accept: Option<&str>) -> Result<reqwest::Response> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.client.get(url);
            if let Some(accept) = accept {
                request = request.header(header::ACCEPT, accept);
            }
            let response = request
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self.send_get(&url, Some(GITHUB_V3_JSON)).await?;
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }
}

#[async_trait]
impl RemoteSource for GithubClient {
    async fn user(&self, login: &str) -> Result<UserProfile> {
        debug!(login, "Fetching user from GitHub");
        self.get_json(&format!("users/{}", login)).await
    }

    async fn followers_of_user(&self, login: &str) -> Result<Vec<Member>> {
        debug!(login, "Fetching followers from GitHub");
        self.get_json(&format!("users/{}/followers", login)).await
    }

    async fn members_of_org(&self, org: &str) -> Result<Vec<Member>> {
        debug!(org, "Fetching org members from GitHub");
        self.get_json(&format!("orgs/{}/members", org)).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send_get(url, None).await?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read download body from {}", url))?;
        debug!(url, len = bytes.len(), "Downloaded binary");
        Ok(bytes.to_vec())
    }
}
