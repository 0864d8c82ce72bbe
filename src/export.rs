//! Durable export of pull-request metadata
//!
//! GitHub has no write API for imported Bitbucket pull requests, so the
//! migration keeps them as one JSON record file per repository instead.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::bitbucket::PullRequest;

/// Writes pull-request records to one JSON file per repository.
pub struct PullRequestExporter {
    out_dir: PathBuf,
}

impl PullRequestExporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Record file for `repo`.
    pub fn export_path(&self, repo: &str) -> PathBuf {
        self.out_dir.join(format!("{}.json", repo))
    }

    /// Writes the records for `repo`, creating the export directory on
    /// first use.
    pub async fn export(&self, repo: &str, pull_requests: &[PullRequest]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create export directory: {}",
                    self.out_dir.display()
                )
            })?;

        let path = self.export_path(repo);
        let json = serde_json::to_vec_pretty(pull_requests)
            .context("Failed to serialize pull requests")?;

        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(
            "Exported {} pull requests for {} to {}",
            pull_requests.len(),
            repo,
            path.display()
        );
        Ok(path)
    }
}
