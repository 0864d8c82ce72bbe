use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::HostCredentials;
use crate::discovery::RepoLister;

/// Bitbucket Cloud REST API base
pub const DEFAULT_API_URL: &str = "https://api.bitbucket.org/2.0";

/// Pull-request states included in the metadata export
const PR_STATES: &str = "OPEN,MERGED,DECLINED,SUPERSEDED";

/// Bitbucket API client scoped to one workspace.
///
/// All listings transparently follow `next` pagination cursors until
/// exhausted and fail on any non-2xx response.
pub struct BitbucketClient {
    http: reqwest::Client,
    api_url: String,
    workspace: String,
    email: String,
    token: String,
}

/// One page of a paginated Bitbucket listing
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepoRecord {
    slug: String,
}

/// Pull-request record kept for the metadata export
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PullRequest {
    pub id: u64,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub source: Option<BranchRef>,
    #[serde(default)]
    pub destination: Option<BranchRef>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub updated_on: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Author {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
}

/// Source or destination side of a pull request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BranchRef {
    #[serde(default)]
    pub branch: Option<Branch>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Branch {
    pub name: String,
}

impl BitbucketClient {
    pub fn new(workspace: &str, credentials: &HostCredentials) -> Self {
        Self::with_api_url(DEFAULT_API_URL, workspace, credentials)
    }

    /// Client against a non-default API base (used by tests)
    pub fn with_api_url(
        api_url: impl Into<String>,
        workspace: &str,
        credentials: &HostCredentials,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            workspace: workspace.to_string(),
            email: credentials.email.clone(),
            token: credentials.access_token.clone(),
        }
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Page<T>> {
        let response = self
            .http
            .get(url)
            .basic_auth(&self.email, Some(&self.token))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Bitbucket API rejected {}", url))?;

        response
            .json::<Page<T>>()
            .await
            .context("Malformed Bitbucket API response")
    }

    /// All repository slugs in the workspace, in listing order.
    pub async fn list_repositories(&self) -> Result<Vec<String>> {
        let mut url = format!("{}/repositories/{}", self.api_url, self.workspace);
        let mut repos = Vec::new();

        loop {
            let page: Page<RepoRecord> = self.get_page(&url, &[]).await?;
            repos.extend(page.values.into_iter().map(|record| record.slug));
            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }

        info!("Discovered {} Bitbucket repos", repos.len());
        Ok(repos)
    }

    /// Pull requests of all states for one repository.
    pub async fn list_pull_requests(&self, repo: &str) -> Result<Vec<PullRequest>> {
        let mut url = format!(
            "{}/repositories/{}/{}/pullrequests",
            self.api_url, self.workspace, repo
        );
        let mut prs = Vec::new();
        // The state filter applies to the first request only; cursor URLs
        // carry their own query string.
        let mut query: &[(&str, &str)] = &[("state", PR_STATES)];

        loop {
            let page: Page<PullRequest> = self.get_page(&url, query).await?;
            prs.extend(page.values);
            query = &[];
            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }

        debug!("Fetched {} pull requests for {}", prs.len(), repo);
        Ok(prs)
    }
}

#[async_trait]
impl RepoLister for BitbucketClient {
    async fn list_repositories(&self) -> Result<Vec<String>> {
        BitbucketClient::list_repositories(self).await
    }
}
