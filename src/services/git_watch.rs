//! Git revision probe backing `Bot.tracked_branch`/`current_commit_hash`/
//! `latest_available_commit_hash`/`commits_behind` (spec §4.5 step 3),
//! grounded in `original_source/services/git_repository.py`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::warn;
use uuid::Uuid;

use crate::store::Store;

#[derive(Debug, Error)]
pub enum GitWatchError {
    #[error("git repository not found at {0}")]
    NotFound(PathBuf),
    #[error("git executable not available")]
    MissingGit,
    #[error("git {args} failed: {stderr}")]
    CommandFailed { args: String, stderr: String },
}

pub struct GitRevisionStatus {
    pub branch: String,
    pub local_commit: String,
    pub remote_commit: String,
    pub commits_behind: i64,
}

pub struct GitWatcher {
    repo_path: PathBuf,
    remote: String,
    branch: String,
}

impl GitWatcher {
    pub fn new(repo_path: impl Into<PathBuf>, remote: impl Into<String>, branch: impl Into<String>) -> Self {
        Self { repo_path: repo_path.into(), remote: remote.into(), branch: branch.into() }
    }

    fn is_available(&self) -> bool {
        self.repo_path.join(".git").exists()
    }

    fn remote_ref(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }

    pub async fn check_status(&self) -> Result<GitRevisionStatus, GitWatchError> {
        if !self.is_available() {
            return Err(GitWatchError::NotFound(self.repo_path.clone()));
        }

        self.run_git(&["fetch", "--prune", &self.remote, &self.branch]).await?;
        let local_commit = self.run_git(&["rev-parse", "HEAD"]).await?;
        let remote_commit = self.run_git(&["rev-parse", &self.remote_ref()]).await?;
        let behind_raw = self
            .run_git(&["rev-list", "--count", &format!("{local_commit}..{}", self.remote_ref())])
            .await?;
        let commits_behind = behind_raw.parse::<i64>().unwrap_or(0).max(0);

        Ok(GitRevisionStatus {
            branch: self.branch.clone(),
            local_commit,
            remote_commit,
            commits_behind,
        })
    }

    async fn run_git(&self, args: &[&str]) -> Result<String, GitWatchError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .await
            .map_err(|_| GitWatchError::MissingGit)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GitWatchError::CommandFailed { args: args.join(" "), stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// One probe tick: checks the repo at `repo_path` and persists the result
/// onto `bot_id` via the telemetry bypass (spec §4.1 `update_git_status`).
/// Probe failures are logged and swallowed — they never interrupt posting.
pub async fn tick(store: &Store, bot_id: Uuid, repo_path: &Path, remote: &str, branch: &str) {
    let watcher = GitWatcher::new(repo_path, remote, branch);
    match watcher.check_status().await {
        Ok(status) => {
            let mut uow = match store.begin().await {
                Ok(uow) => uow,
                Err(err) => {
                    warn!(error = %err, "git watch: failed to open unit of work");
                    return;
                }
            };
            if let Err(err) = uow
                .bots()
                .update_git_status(bot_id, &status.branch, &status.local_commit, &status.remote_commit, status.commits_behind)
                .await
            {
                warn!(error = %err, "git watch: failed to persist status");
                return;
            }
            if let Err(err) = uow.commit().await {
                warn!(error = %err, "git watch: failed to commit status");
            }
        }
        Err(err) => warn!(error = %err, "git watch: probe failed"),
    }
}
