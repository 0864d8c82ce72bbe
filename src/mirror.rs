//! On-disk store of bare mirror clones
//!
//! One bare mirror per repository under an injected root directory. The
//! store owns those paths exclusively: it creates them on first sync,
//! refreshes them on every later sync, and recreates them wholesale when a
//! fetch fails.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::git::Git;

/// Name of the destination remote inside each mirror
const DEST_REMOTE: &str = "github";

/// Local bare-clone state for one repository.
#[derive(Debug, Clone)]
pub struct MirrorHandle {
    pub repo: String,
    pub path: PathBuf,
}

/// Why a repository's mirror pipeline failed.
///
/// Fetch failures never surface here: they are consumed by the
/// recreate-from-scratch recovery path and only become `Clone` errors when
/// the recovery clone fails too.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("preparing mirror root failed: {0}")]
    Root(std::io::Error),

    #[error("mirror clone failed: {0}")]
    Clone(anyhow::Error),

    #[error("mirror refresh failed: {0}")]
    Refresh(anyhow::Error),

    #[error("removing corrupt mirror failed: {0}")]
    Recreate(std::io::Error),

    #[error("configuring destination remote failed: {0}")]
    Remote(anyhow::Error),

    #[error("mirror push failed: {0}")]
    Push(anyhow::Error),
}

/// Cache of bare mirror clones, one per repository, keyed by slug.
pub struct MirrorStore {
    root: PathBuf,
    git: Git,
}

impl MirrorStore {
    pub fn new(root: impl Into<PathBuf>, git: Git) -> Self {
        Self {
            root: root.into(),
            git,
        }
    }

    /// Local path of the bare mirror for `repo`.
    pub fn mirror_path(&self, repo: &str) -> PathBuf {
        self.root.join(format!("{}.git", repo))
    }

    /// Drives one repository's mirror until the destination is ref-for-ref
    /// identical to the source.
    ///
    /// State machine, re-evaluated every run:
    /// 1. mirror absent: clone a full bare mirror from `source_url`
    /// 2. mirror present: repoint `origin` (credentials may have rotated),
    ///    then fetch with pruning; a failed fetch marks the mirror corrupt
    ///    and it is deleted and re-cloned
    /// 3. ensure the destination remote points at `dest_url`
    /// 4. force-push all refs to the destination
    pub async fn sync(
        &self,
        repo: &str,
        source_url: &str,
        dest_url: &str,
    ) -> Result<MirrorHandle, MirrorError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(MirrorError::Root)?;

        let path = self.mirror_path(repo);

        if !path.exists() {
            info!("Cloning mirror repository");
            self.git
                .clone_mirror(source_url, &path)
                .await
                .map_err(MirrorError::Clone)?;
        } else {
            info!("Updating existing mirror");
            // Unconditional: the stored URL may carry stale credentials
            self.git
                .set_remote_url(&path, "origin", source_url)
                .await
                .map_err(MirrorError::Refresh)?;

            let fetch = self
                .git
                .fetch_prune(&path)
                .await
                .map_err(MirrorError::Refresh)?;

            if !fetch.success {
                warn!(
                    "Mirror fetch failed, recreating mirror: {}",
                    fetch.stderr.trim()
                );
                tokio::fs::remove_dir_all(&path)
                    .await
                    .map_err(MirrorError::Recreate)?;
                self.git
                    .clone_mirror(source_url, &path)
                    .await
                    .map_err(MirrorError::Clone)?;
            }
        }

        self.ensure_dest_remote(&path, dest_url)
            .await
            .map_err(MirrorError::Remote)?;

        self.git
            .push_mirror(&path, DEST_REMOTE)
            .await
            .map_err(MirrorError::Push)?;

        Ok(MirrorHandle {
            repo: repo.to_string(),
            path,
        })
    }

    /// Adds the destination remote, or repoints it if it already exists.
    async fn ensure_dest_remote(&self, path: &Path, dest_url: &str) -> anyhow::Result<()> {
        let remotes = self.git.list_remotes(path).await?;
        if remotes.iter().any(|remote| remote == DEST_REMOTE) {
            self.git.set_remote_url(path, DEST_REMOTE, dest_url).await
        } else {
            self.git.add_remote(path, DEST_REMOTE, dest_url).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{CommandOutput, CommandRunner, GitCommand};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Records every git invocation; clone commands materialize their target
    /// directory so `path.exists()` behaves like the real tool.
    struct FakeRunner {
        calls: Mutex<Vec<String>>,
        // (substring, remaining failure count)
        failures: Mutex<Vec<(String, usize)>>,
    }

    impl FakeRunner {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                failures: Mutex::new(Vec::new()),
            })
        }

        fn fail_next(&self, pattern: &str, times: usize) {
            self.failures
                .lock()
                .unwrap()
                .push((pattern.to_string(), times));
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, cmd: &GitCommand) -> Result<CommandOutput> {
            let line = match &cmd.cwd {
                Some(dir) => format!("[{}] {}", dir.display(), cmd.args.join(" ")),
                None => cmd.args.join(" "),
            };
            self.calls.lock().unwrap().push(line.clone());

            {
                let mut failures = self.failures.lock().unwrap();
                for (pattern, remaining) in failures.iter_mut() {
                    if *remaining > 0 && line.contains(pattern.as_str()) {
                        *remaining -= 1;
                        return Ok(CommandOutput {
                            success: false,
                            stdout: String::new(),
                            stderr: format!("simulated failure: {}", pattern),
                        });
                    }
                }
            }

            if cmd.args.first().map(String::as_str) == Some("clone") {
                let target = cmd.args.last().expect("clone without target");
                std::fs::create_dir_all(target).expect("Failed to create clone target");
            }

            // `git remote` listing: pretend only origin is configured
            let stdout = if cmd.args == ["remote"] {
                "origin\n".to_string()
            } else {
                String::new()
            };

            Ok(CommandOutput {
                success: true,
                stdout,
                stderr: String::new(),
            })
        }
    }

    const SRC: &str = "https://u:t@bitbucket.org/ws/alpha.git";
    const DST: &str = "https://u:t@github.com/org/alpha.git";

    #[tokio::test]
    async fn test_first_sync_clones_and_pushes() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::new();
        let store = MirrorStore::new(dir.path(), Git::new(runner.clone()));

        let handle = store.sync("alpha", SRC, DST).await.unwrap();

        assert_eq!(handle.path, dir.path().join("alpha.git"));
        assert!(handle.path.exists());

        let calls = runner.calls();
        assert!(calls[0].starts_with("clone --mirror"));
        assert!(calls.iter().any(|c| c.contains("remote add github")));
        assert!(calls.last().unwrap().contains("push --mirror github"));
        // No fetch on the initial clone path
        assert!(!calls.iter().any(|c| c.contains("fetch")));
    }

    #[tokio::test]
    async fn test_second_sync_refreshes_instead_of_cloning() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::new();
        let store = MirrorStore::new(dir.path(), Git::new(runner.clone()));

        store.sync("alpha", SRC, DST).await.unwrap();
        let first_run_calls = runner.calls().len();

        store.sync("alpha", SRC, DST).await.unwrap();
        let calls = runner.calls()[first_run_calls..].to_vec();

        assert!(!calls.iter().any(|c| c.contains("clone")));
        assert!(calls.iter().any(|c| c.contains("remote set-url origin")));
        assert!(calls.iter().any(|c| c.contains("fetch --prune")));
        assert!(calls.last().unwrap().contains("push --mirror github"));
    }

    #[tokio::test]
    async fn test_fetch_failure_recreates_mirror_and_still_pushes() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::new();
        let store = MirrorStore::new(dir.path(), Git::new(runner.clone()));

        store.sync("alpha", SRC, DST).await.unwrap();

        // Leave a marker behind: recovery must wipe the whole directory
        let marker = dir.path().join("alpha.git").join("stale-object");
        std::fs::write(&marker, b"junk").unwrap();

        runner.fail_next("fetch --prune", 1);
        let handle = store.sync("alpha", SRC, DST).await.unwrap();

        assert!(handle.path.exists());
        assert!(!marker.exists());

        let calls = runner.calls();
        let clone_count = calls.iter().filter(|c| c.starts_with("clone")).count();
        assert_eq!(clone_count, 2, "recovery should re-clone from scratch");
        assert!(calls.last().unwrap().contains("push --mirror github"));
    }

    #[tokio::test]
    async fn test_clone_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::new();
        let store = MirrorStore::new(dir.path(), Git::new(runner.clone()));

        runner.fail_next("clone --mirror", 1);
        let err = store.sync("alpha", SRC, DST).await.unwrap_err();
        assert!(matches!(err, MirrorError::Clone(_)));
    }

    #[tokio::test]
    async fn test_push_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::new();
        let store = MirrorStore::new(dir.path(), Git::new(runner.clone()));

        runner.fail_next("push --mirror", 1);
        let err = store.sync("alpha", SRC, DST).await.unwrap_err();
        assert!(matches!(err, MirrorError::Push(_)));
    }

    #[tokio::test]
    async fn test_recovery_clone_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::new();
        let store = MirrorStore::new(dir.path(), Git::new(runner.clone()));

        store.sync("alpha", SRC, DST).await.unwrap();

        runner.fail_next("fetch --prune", 1);
        runner.fail_next("clone --mirror", 1);
        let err = store.sync("alpha", SRC, DST).await.unwrap_err();
        assert!(matches!(err, MirrorError::Clone(_)));
    }
}
