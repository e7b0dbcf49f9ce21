//! Asynchronous git CLI client.
//!
//! The backend keeps two clones of the upstream repository inside a merge
//! workspace directory under the local tree: `base` pinned at the last
//! reconciled revision and `latest` following the upstream head. Clones are
//! used instead of submodules to keep the workspace ephemeral and avoid
//! registering anything in the operator's repository.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{MergeOutcome, Revision, VcsBackend};
use crate::errors::GitError;

/// Client for the local tree and its base/latest upstream clones.
#[derive(Debug, Clone)]
pub struct GitBackend {
    repo_root: PathBuf,
    workspace: PathBuf,
}

impl GitBackend {
    /// Create a backend for the tree at `repo_root` with the merge workspace
    /// in `workspace_dir` (relative to the root).
    pub fn new(repo_root: impl Into<PathBuf>, workspace_dir: &str) -> Self {
        let repo_root = repo_root.into();
        let workspace = repo_root.join(workspace_dir);
        Self {
            repo_root,
            workspace,
        }
    }

    /// Root of the local tree.
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// The merge workspace directory.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Checkout directory of the `latest` clone (used by the initial import).
    pub fn latest_dir(&self) -> PathBuf {
        self.workspace.join(Revision::Latest.dir_name())
    }

    /// Whether both workspace clones exist.
    pub fn is_initialized(&self) -> bool {
        self.workspace.join(Revision::Base.dir_name()).exists()
            && self.workspace.join(Revision::Latest.dir_name()).exists()
    }

    /// Set up the workspace: `git init` the local tree if it is not yet a
    /// repository, then clone `remote_url` into `base` and `latest`.
    pub async fn init_workspace(&self, remote_url: &str) -> Result<(), GitError> {
        if !self.repo_root.join(".git").exists() {
            info!(root = %self.repo_root.display(), "initializing local repository");
            self.run_git(&self.repo_root, &["init"]).await?;
        }

        std::fs::create_dir_all(&self.workspace)?;

        for rev in [Revision::Base, Revision::Latest] {
            let target = self.workspace.join(rev.dir_name());
            if target.exists() {
                std::fs::remove_dir_all(&target)?;
            }
            info!(%rev, url = remote_url, "cloning upstream into workspace");
            self.run_git(&self.workspace, &["clone", remote_url, rev.dir_name()])
                .await?;
        }

        Ok(())
    }

    fn clone_dir(&self, rev: Revision) -> PathBuf {
        self.workspace.join(rev.dir_name())
    }

    /// Require the workspace to exist before any revision-scoped command.
    fn check_initialized(&self) -> Result<(), GitError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(GitError::WorkspaceMissing(
                self.workspace.display().to_string(),
            ))
        }
    }

    async fn run_git(&self, dir: &Path, args: &[&str]) -> Result<String, GitError> {
        let (code, stdout, stderr) = self.run_git_raw(dir, args).await?;
        if code != 0 {
            warn!(exit_code = code, %stderr, "git command failed");
            return Err(GitError::CommandFailed {
                exit_code: code,
                stderr,
            });
        }
        Ok(stdout)
    }

    /// Low-level runner that surfaces the exit code instead of failing on it;
    /// `git merge-file` encodes its result in the code.
    async fn run_git_raw(
        &self,
        dir: &Path,
        args: &[&str],
    ) -> Result<(i32, String, String), GitError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(dir)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(cmd = ?format!("git {}", args.join(" ")), dir = %dir.display(), "running git command");
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::BinaryNotFound("git".into())
            } else {
                GitError::IoError(e)
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        Ok((output.status.code().unwrap_or(-1), stdout, stderr))
    }
}

impl VcsBackend for GitBackend {
    async fn fetch_latest(&self) -> Result<(), GitError> {
        self.check_initialized()?;
        self.run_git(&self.clone_dir(Revision::Latest), &["pull", "--rebase"])
            .await?;
        info!("updated latest upstream clone");
        Ok(())
    }

    async fn head_revision(&self, rev: Revision) -> Result<String, GitError> {
        self.check_initialized()?;
        let out = self
            .run_git(&self.clone_dir(rev), &["rev-parse", "HEAD"])
            .await?;
        Ok(out.trim().to_string())
    }

    async fn content_at(&self, rev: Revision, path: &str) -> Result<Option<String>, GitError> {
        self.check_initialized()?;
        let object = format!("HEAD:{}", path);
        match self.run_git(&self.clone_dir(rev), &["show", &object]).await {
            Ok(content) => Ok(Some(content)),
            // The path does not exist at this revision.
            Err(GitError::CommandFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn changed_paths(&self, path_filter: Option<&str>) -> Result<Vec<String>, GitError> {
        self.check_initialized()?;
        let base_sha = self.head_revision(Revision::Base).await?;
        let output = self
            .run_git(
                &self.clone_dir(Revision::Latest),
                &["diff", "--name-only", &base_sha, "HEAD"],
            )
            .await?;

        let paths: Vec<String> = output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .filter(|l| match path_filter {
                Some(prefix) => l.starts_with(prefix),
                None => true,
            })
            .map(str::to_string)
            .collect();

        debug!(count = paths.len(), "listed changed upstream paths");
        Ok(paths)
    }

    async fn three_way_merge(
        &self,
        base: &str,
        ours: &str,
        theirs: &str,
    ) -> Result<MergeOutcome, GitError> {
        let scratch = tempfile::tempdir()?;
        std::fs::write(scratch.path().join("base"), base)?;
        std::fs::write(scratch.path().join("ours"), ours)?;
        std::fs::write(scratch.path().join("theirs"), theirs)?;

        // Exit code is the number of conflicts (0 = clean); codes above 127
        // signal a real failure.
        let (code, stdout, stderr) = self
            .run_git_raw(
                scratch.path(),
                &[
                    "merge-file",
                    "-p",
                    "-L",
                    "ours",
                    "-L",
                    "base",
                    "-L",
                    "theirs",
                    "ours",
                    "base",
                    "theirs",
                ],
            )
            .await?;

        match code {
            0 => Ok(MergeOutcome {
                clean: true,
                content: stdout,
            }),
            1..=127 => {
                debug!(conflicts = code, "merge produced conflicts");
                Ok(MergeOutcome {
                    clean: false,
                    content: stdout,
                })
            }
            _ => Err(GitError::CommandFailed {
                exit_code: code,
                stderr,
            }),
        }
    }

    async fn stage(&self, path: &str) -> Result<(), GitError> {
        self.run_git(&self.repo_root, &["add", "--", path]).await?;
        debug!(path, "staged");
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<(), GitError> {
        self.run_git(&self.repo_root, &["commit", "-m", message])
            .await?;
        info!("created commit");
        Ok(())
    }

    async fn advance_base(&self) -> Result<(), GitError> {
        self.check_initialized()?;
        let latest_sha = self.head_revision(Revision::Latest).await?;
        let base_dir = self.clone_dir(Revision::Base);
        self.run_git(&base_dir, &["fetch", "origin"]).await?;
        self.run_git(&base_dir, &["reset", "--hard", &latest_sha])
            .await?;
        info!(sha = %latest_sha, "advanced base pointer");
        Ok(())
    }
}
