use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration problems that abort the run before any repository is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid repository selection: use \"*\", [\"*\"], a list of repository names, or a .csv filename")]
    InvalidSelection,

    #[error("CSV must contain a 'repository' column")]
    MissingRepositoryColumn,
}

/// Main configuration structure for repobridge
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Source workspace and repository selection
    pub bitbucket: BitbucketConfig,

    /// Destination organization
    pub github: GithubConfig,

    /// Local mirror cache settings
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// Pull-request metadata export settings
    #[serde(default)]
    pub export: ExportConfig,
}

/// Bitbucket source configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BitbucketConfig {
    /// Workspace the repositories are migrated out of
    pub workspace: String,

    /// Which repositories to migrate: `"*"`, `["*"]`, a list of names,
    /// or a CSV filename with a `repository` column
    pub repositories: SelectionSpec,
}

/// GitHub destination configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GithubConfig {
    /// Organization the repositories are created under
    pub organization: String,
}

/// Local mirror cache configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MirrorConfig {
    /// Directory holding one bare mirror clone per repository
    #[serde(default = "default_mirror_root")]
    pub root: String,
}

/// Pull-request export configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExportConfig {
    /// Export pull-request metadata after each repository sync
    #[serde(default)]
    pub pull_requests: bool,

    /// Directory the per-repository JSON records are written to
    #[serde(default = "default_export_dir")]
    pub dir: String,
}

/// Raw YAML shape of the repository selection.
///
/// The config file accepts either a bare string or a list; [`classify`]
/// turns this into a tagged [`RepoSelection`] exactly once at the boundary.
///
/// [`classify`]: SelectionSpec::classify
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum SelectionSpec {
    One(String),
    Many(Vec<String>),
}

/// Which repositories a run migrates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSelection {
    /// Every repository in the source workspace
    AllRemote,
    /// Names listed directly in the config
    Explicit(Vec<String>),
    /// Names read from the `repository` column of a CSV file
    CsvFile(PathBuf),
}

impl SelectionSpec {
    /// Classifies the raw config shape into a [`RepoSelection`].
    ///
    /// The wildcard marker is recognized both bare (`"*"`) and as a
    /// single-element list (`["*"]`). A list mixing the wildcard with real
    /// names is rejected.
    pub fn classify(&self) -> Result<RepoSelection, ConfigError> {
        match self {
            SelectionSpec::One(s) if s == "*" => Ok(RepoSelection::AllRemote),
            SelectionSpec::One(s) if s.ends_with(".csv") => {
                Ok(RepoSelection::CsvFile(PathBuf::from(s)))
            }
            SelectionSpec::Many(items) if items.len() == 1 && items[0] == "*" => {
                Ok(RepoSelection::AllRemote)
            }
            SelectionSpec::Many(items)
                if !items.is_empty() && !items.iter().any(|item| item == "*") =>
            {
                Ok(RepoSelection::Explicit(items.clone()))
            }
            _ => Err(ConfigError::InvalidSelection),
        }
    }
}

/// Credentials for both hosting services, held in memory for the run only.
#[derive(Debug, Deserialize, Clone)]
pub struct Secrets {
    pub bitbucket: HostCredentials,
    pub github: HostCredentials,
}

/// Credentials for one hosting service
#[derive(Debug, Deserialize, Clone)]
pub struct HostCredentials {
    pub username: String,
    pub email: String,
    pub access_token: String,
}

// Default value functions
fn default_mirror_root() -> String {
    "~/bb_mirrors".to_string()
}

fn default_export_dir() -> String {
    "pull_requests".to_string()
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            root: default_mirror_root(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            pull_requests: false,
            dir: default_export_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Mirror cache root with `~` and environment variables expanded
    pub fn mirror_root(&self) -> Result<PathBuf> {
        let expanded =
            shellexpand::full(&self.mirror.root).context("Failed to expand mirror root path")?;
        Ok(PathBuf::from(expanded.as_ref()))
    }

    /// Pull-request export directory with `~` and environment variables expanded
    pub fn export_dir(&self) -> Result<PathBuf> {
        let expanded =
            shellexpand::full(&self.export.dir).context("Failed to expand export directory path")?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

impl Secrets {
    /// Load credentials from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read secrets file: {:?}", path))?;

        let secrets: Secrets = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse secrets file: {:?}", path))?;

        Ok(secrets)
    }
}
