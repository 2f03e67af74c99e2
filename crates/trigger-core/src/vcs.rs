//! Version-control boundary and its `git` implementation.
//!
//! A [`Vcs`] is a handle on one repository's local mirror. The mirror may
//! lag behind the remote; callers that hit [`VcsError::UnknownRevision`] are
//! expected to `update` and retry (see [`crate::extractor`]).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use trigger_state::{Repository, RepositoryBackend};

use crate::error::VcsError;

pub type VcsResult<T> = std::result::Result<T, VcsError>;

/// Operations on a repository mirror.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Whether the local mirror is present on disk.
    async fn exists(&self) -> bool;

    /// Create the local mirror from the remote.
    async fn clone_mirror(&self) -> VcsResult<()>;

    /// Fetch new history from the remote into the mirror.
    async fn update(&self) -> VcsResult<()>;

    /// Raw unified diff introduced by `sha`.
    ///
    /// Fails with [`VcsError::UnknownRevision`] when the mirror lacks the commit.
    async fn export(&self, sha: &str) -> VcsResult<String>;
}

/// Maps a repository to a VCS handle, if its backend is supported.
pub trait VcsProvider: Send + Sync {
    fn vcs_for(&self, repository: &Repository) -> Option<Arc<dyn Vcs>>;
}

/// Mirror of a git remote driven through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitVcs {
    binpath: String,
    url: String,
    path: PathBuf,
}

impl GitVcs {
    pub fn new(
        binpath: impl Into<String>,
        url: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            binpath: binpath.into(),
            url: url.into(),
            path: path.into(),
        }
    }

    async fn run(&self, args: &[&str], cwd: Option<&Path>) -> VcsResult<std::process::Output> {
        let mut command = Command::new(&self.binpath);
        command.args(args);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        debug!(git = %self.binpath, args = ?args, "running git");
        Ok(command.output().await?)
    }

    async fn run_checked(&self, args: &[&str], cwd: Option<&Path>) -> VcsResult<String> {
        let output = self.run(args, cwd).await?;
        if !output.status.success() {
            return Err(VcsError::Command {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Vcs for GitVcs {
    async fn exists(&self) -> bool {
        tokio::fs::try_exists(self.path.join("HEAD"))
            .await
            .unwrap_or(false)
    }

    async fn clone_mirror(&self) -> VcsResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let target = self.path.to_string_lossy();
        self.run_checked(
            &["clone", "--mirror", "--quiet", self.url.as_str(), target.as_ref()],
            None,
        )
        .await?;
        Ok(())
    }

    async fn update(&self) -> VcsResult<()> {
        self.run_checked(&["remote", "update", "--prune"], Some(&self.path))
            .await?;
        Ok(())
    }

    async fn export(&self, sha: &str) -> VcsResult<String> {
        if !is_plausible_sha(sha) {
            return Err(VcsError::UnknownRevision {
                sha: sha.to_string(),
            });
        }

        let object = format!("{sha}^{{commit}}");
        let lookup = self
            .run(&["cat-file", "-e", object.as_str()], Some(&self.path))
            .await?;
        if !lookup.status.success() {
            return Err(VcsError::UnknownRevision {
                sha: sha.to_string(),
            });
        }

        // Diff against the first parent; root commits diff against the empty tree.
        self.run_checked(
            &[
                "-c",
                "core.quotePath=false",
                "show",
                "--src-prefix=a/",
                "--dst-prefix=b/",
                "--format=",
                "--no-color",
                "--no-ext-diff",
                "--no-renames",
                "-m",
                "--first-parent",
                sha,
            ],
            Some(&self.path),
        )
        .await
    }
}

/// Hex object names only; anything else can never name a commit here.
fn is_plausible_sha(sha: &str) -> bool {
    (4..=64).contains(&sha.len()) && sha.chars().all(|c| c.is_ascii_hexdigit())
}

/// Provides [`GitVcs`] mirrors under a common root, one directory per repository.
#[derive(Debug, Clone)]
pub struct GitVcsProvider {
    binpath: String,
    mirror_root: PathBuf,
}

impl GitVcsProvider {
    pub fn new(binpath: impl Into<String>, mirror_root: impl Into<PathBuf>) -> Self {
        Self {
            binpath: binpath.into(),
            mirror_root: mirror_root.into(),
        }
    }

    pub fn mirror_path(&self, repository: &Repository) -> PathBuf {
        self.mirror_root.join(format!("{}.git", repository.id))
    }
}

impl VcsProvider for GitVcsProvider {
    fn vcs_for(&self, repository: &Repository) -> Option<Arc<dyn Vcs>> {
        match repository.backend {
            RepositoryBackend::Git => Some(Arc::new(GitVcs::new(
                self.binpath.clone(),
                repository.url.clone(),
                self.mirror_path(repository),
            ))),
            RepositoryBackend::Unknown => None,
        }
    }
}
