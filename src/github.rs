use anyhow::{anyhow, Context, Result};
use reqwest::{header, Method, StatusCode};
use serde_json::json;
use tracing::{debug, info};

/// GitHub REST API base
pub const DEFAULT_API_URL: &str = "https://api.github.com";

// GitHub rejects requests without a User-Agent
const USER_AGENT: &str = concat!("repobridge/", env!("CARGO_PKG_VERSION"));

/// GitHub REST client for destination-side repository management.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(token: &str) -> Self {
        Self::with_api_url(DEFAULT_API_URL, token)
    }

    /// Client against a non-default API base (used by tests)
    pub fn with_api_url(api_url: impl Into<String>, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            token: token.to_string(),
        }
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header(header::AUTHORIZATION, format!("token {}", self.token))
            .header(header::ACCEPT, "application/vnd.github+json")
            .header(header::USER_AGENT, USER_AGENT)
    }

    /// Idempotently creates the destination repository as private.
    ///
    /// A 422 means the repository already exists and counts as success; any
    /// other failure is fatal for this repository's sync.
    pub async fn ensure_repo(&self, org: &str, repo: &str) -> Result<()> {
        let url = format!("{}/orgs/{}/repos", self.api_url, org);
        let response = self
            .request(Method::POST, &url)
            .json(&json!({ "name": repo, "private": true }))
            .send()
            .await
            .with_context(|| format!("Failed to create GitHub repository {}/{}", org, repo))?;

        match response.status() {
            StatusCode::CREATED => {
                info!("GitHub repo created: {}/{}", org, repo);
                Ok(())
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                debug!("GitHub repo already exists: {}/{}", org, repo);
                Ok(())
            }
            status => Err(anyhow!(
                "Creating GitHub repository {}/{} failed with status {}",
                org,
                repo,
                status
            )),
        }
    }

    /// Points the repository's default branch at `branch`.
    ///
    /// Best-effort at the call site: the orchestrator logs failures and
    /// continues with the repository's sync.
    pub async fn set_default_branch(&self, org: &str, repo: &str, branch: &str) -> Result<()> {
        let url = format!("{}/repos/{}/{}", self.api_url, org, repo);
        let response = self
            .request(Method::PATCH, &url)
            .json(&json!({ "default_branch": branch }))
            .send()
            .await
            .with_context(|| format!("Failed to update GitHub repository {}/{}", org, repo))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(
                "Setting default branch '{}' on {}/{} failed with status {}",
                branch,
                org,
                repo,
                status
            ));
        }

        debug!("Default branch of {}/{} set to '{}'", org, repo, branch);
        Ok(())
    }
}
