//! repobridge - Bitbucket to GitHub repository migration
//!
//! repobridge mirrors repositories out of a Bitbucket workspace into a GitHub
//! organization: full history, branches, tags, and the default-branch setting,
//! with optional export of pull-request metadata to JSON records.
//!
//! It is a batch tool, idempotent per run: every selected repository is kept
//! as a local bare mirror that is refreshed (or recreated when corrupt) and
//! force-pushed to the destination, so the destination always ends up
//! ref-for-ref identical to the source.
//!
//! ## Modules
//!
//! - [`config`]: YAML configuration, secrets, and repository selection
//! - [`discovery`]: resolving the selection into concrete repository slugs
//! - [`git`]: git command execution with credential masking
//! - [`mirror`]: the on-disk store of bare mirror clones
//! - [`sync`]: the per-repository migration pipeline

pub mod bitbucket;
pub mod config;
pub mod discovery;
pub mod export;
pub mod git;
pub mod github;
pub mod mirror;
pub mod sync;

pub use config::{Config, ConfigError, RepoSelection, Secrets};
pub use git::{CommandOutput, CommandRunner, Git, GitCommand};
pub use mirror::{MirrorHandle, MirrorStore};
pub use sync::{SyncEngine, SyncOutcome, SyncSummary};
