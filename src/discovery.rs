//! Repository selection resolution
//!
//! Turns the configured selection (wildcard, explicit list, CSV file) into
//! the concrete ordered list of repository slugs a run migrates.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

use crate::config::{ConfigError, RepoSelection};

/// Source-side repository listing.
///
/// Implemented by the Bitbucket client; swapped for a stub in tests.
#[async_trait]
pub trait RepoLister: Send + Sync {
    async fn list_repositories(&self) -> Result<Vec<String>>;
}

/// Resolves a classified selection into the repositories to migrate.
///
/// Wildcard selections delegate to the lister and preserve its order; list
/// and CSV selections are normalized to a duplicate-free, stably ordered
/// set without touching the network. A lister failure here is fatal to the
/// whole run: no repositories can be determined.
pub async fn resolve_repos(
    selection: &RepoSelection,
    lister: &dyn RepoLister,
) -> Result<Vec<String>> {
    match selection {
        RepoSelection::AllRemote => {
            info!("Migrating ALL Bitbucket repositories");
            lister
                .list_repositories()
                .await
                .context("Repository discovery failed")
        }
        RepoSelection::Explicit(names) => {
            info!("Migrating {} explicitly listed repositories", names.len());
            Ok(normalize(names.iter().map(String::as_str)))
        }
        RepoSelection::CsvFile(path) => {
            info!("Reading repositories from CSV: {}", path.display());
            repos_from_csv(path)
        }
    }
}

/// Reads the `repository` column of a CSV file.
///
/// Fails with [`ConfigError::MissingRepositoryColumn`] before yielding any
/// data when the column is absent.
fn repos_from_csv(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let column = reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .position(|header| header == "repository")
        .ok_or(ConfigError::MissingRepositoryColumn)?;

    let mut repos = BTreeSet::new();
    for record in reader.records() {
        let record = record.context("Failed to read CSV record")?;
        if let Some(value) = record.get(column) {
            let value = value.trim();
            if !value.is_empty() {
                repos.insert(value.to_string());
            }
        }
    }

    Ok(repos.into_iter().collect())
}

/// Trims, drops empties, collapses duplicates; BTreeSet order keeps the
/// result stable across runs for reproducible logs.
fn normalize<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    names
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
