//! Git operations using the system `git` via tokio::process

use crate::backends::process::{require_tool, run_command};
use crate::backends::{CommandOutput, Vcs};
use crate::error::BackendError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

const GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Git repository handle driven through the git CLI
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
}

impl GitCli {
    /// Open the repository at `path`, checking that git is installed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        require_tool("git")?;
        Ok(Self {
            repo_path: path.as_ref().to_path_buf(),
        })
    }

    /// Repository working directory
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    async fn run_git(&self, args: &[&str]) -> Result<CommandOutput, BackendError> {
        run_command("git", args, &self.repo_path, GIT_TIMEOUT).await
    }

    async fn run_git_checked(&self, args: &[&str]) -> Result<String, BackendError> {
        let output = self.run_git(args).await?;

        if !output.ok {
            return Err(BackendError::CommandFailed {
                command: output.command.clone(),
                reason: output.error_text(),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn tag_exists(&self, name: &str) -> Result<bool, BackendError> {
        let reference = format!("refs/tags/{}", name);
        let output = self
            .run_git(&["rev-parse", "--verify", "--quiet", &reference])
            .await?;
        Ok(output.ok)
    }

    async fn tag(&self, name: &str, message: &str, dry_run: bool) -> Result<(), BackendError> {
        if dry_run {
            log::info!("[dry-run] git tag -a {} -m {:?}", name, message);
            return Ok(());
        }

        self.run_git_checked(&["tag", "-a", name, "-m", message]).await?;
        Ok(())
    }

    async fn delete_tag(&self, name: &str, remote: Option<&str>, dry_run: bool) -> Result<(), BackendError> {
        if dry_run {
            log::info!("[dry-run] git tag -d {}", name);
            if let Some(remote) = remote {
                log::info!("[dry-run] git push {} :refs/tags/{}", remote, name);
            }
            return Ok(());
        }

        self.run_git_checked(&["tag", "-d", name]).await?;

        if let Some(remote) = remote {
            let refspec = format!(":refs/tags/{}", name);
            let output = self.run_git(&["push", remote, &refspec]).await?;
            if !output.ok {
                // A tag that never reached the remote is not a failure
                let text = output.error_text();
                if !text.contains("remote ref does not exist") {
                    return Err(BackendError::CommandFailed {
                        command: output.command,
                        reason: text,
                    });
                }
                log::debug!("tag {} was not present on {}", name, remote);
            }
        }

        Ok(())
    }

    async fn push(&self, tags: &[String], remote: &str, dry_run: bool) -> Result<CommandOutput, BackendError> {
        let refspecs: Vec<String> = tags.iter().map(|t| format!("refs/tags/{}", t)).collect();
        let mut args = vec!["push", "--atomic", remote];
        args.extend(refspecs.iter().map(String::as_str));

        if dry_run {
            log::info!("[dry-run] git {}", args.join(" "));
            return Ok(CommandOutput::success(format!("git {}", args.join(" "))));
        }

        self.run_git(&args).await
    }
}
