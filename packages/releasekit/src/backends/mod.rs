//! Narrow interfaces to the outside world, plus one implementation of each.
//!
//! The publish orchestrator and tag manager only ever talk to the traits in
//! this module. Concrete implementations ([`GitCli`], [`CargoBackend`],
//! [`SparseIndexRegistry`], [`GitHubForge`]) are chosen by the binary.

mod cargo;
mod crates_io;
mod git;
mod github;
mod process;

pub use cargo::CargoBackend;
pub use crates_io::SparseIndexRegistry;
pub use git::GitCli;
pub use github::GitHubForge;
pub use process::run_command;

use crate::error::BackendError;
use crate::workspace::Package;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Captured outcome of an external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Command line, for diagnostics
    pub command: String,
    /// Whether the command reported success
    pub ok: bool,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Synthetic success, used for dry runs and in-memory backends
    pub fn success(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            ..Self::default()
        }
    }

    /// Synthetic failure with a reason on stderr
    pub fn failure(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: false,
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// Most useful text for an error message: stderr, falling back to stdout
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// A manifest rewritten for publishing, restorable to its original text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedManifest {
    path: PathBuf,
    original: Option<String>,
}

impl PinnedManifest {
    /// Record a rewrite of `path` whose previous content was `original`
    pub fn rewritten(path: impl Into<PathBuf>, original: String) -> Self {
        Self {
            path: path.into(),
            original: Some(original),
        }
    }

    /// Nothing was changed (dry run, or nothing to pin)
    pub fn untouched(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            original: None,
        }
    }

    /// Manifest path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a restore would write anything
    pub fn is_rewritten(&self) -> bool {
        self.original.is_some()
    }

    /// Put the original manifest text back
    pub fn restore(&self) -> Result<(), BackendError> {
        if let Some(original) = &self.original {
            std::fs::write(&self.path, original).map_err(|e| BackendError::PinFailed {
                path: self.path.clone(),
                reason: format!("Failed to restore original manifest: {}", e),
            })?;
        }
        Ok(())
    }
}

/// Platform release to create on a forge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    /// Tag the release points at
    pub tag: String,
    /// Release title
    pub title: String,
    /// Markdown body
    pub body: String,
    /// Create hidden, to be promoted later
    pub draft: bool,
    /// Mark as pre-release
    pub prerelease: bool,
    /// Files to attach
    pub assets: Vec<PathBuf>,
}

/// Version control operations used for tagging
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Whether a tag exists locally
    async fn tag_exists(&self, name: &str) -> Result<bool, BackendError>;

    /// Create an annotated tag at HEAD
    async fn tag(&self, name: &str, message: &str, dry_run: bool) -> Result<(), BackendError>;

    /// Delete a tag locally and, when `remote` is given, on that remote
    async fn delete_tag(&self, name: &str, remote: Option<&str>, dry_run: bool) -> Result<(), BackendError>;

    /// Push the given tags to `remote` in one call
    async fn push(&self, tags: &[String], remote: &str, dry_run: bool) -> Result<CommandOutput, BackendError>;
}

/// Ecosystem package manager (cargo, uv, pnpm, ...)
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Rewrite the package's version and its internal dependency constraints
    async fn pin_versions(
        &self,
        package: &Package,
        own_version: &str,
        dependencies: &BTreeMap<String, String>,
        dry_run: bool,
    ) -> Result<PinnedManifest, BackendError>;

    /// Build distributable artifacts of the package into `output_dir`
    async fn build(&self, package_dir: &Path, output_dir: &Path, dry_run: bool) -> Result<CommandOutput, BackendError>;

    /// Upload built artifacts
    ///
    /// Errors worth retrying are reported as [`BackendError::Transient`].
    async fn publish(
        &self,
        package: &Package,
        artifacts: &[PathBuf],
        index_url: Option<&str>,
        dry_run: bool,
    ) -> Result<CommandOutput, BackendError>;

    /// Minimal install/import check of a published version
    async fn smoke_test(&self, name: &str, version: &str, dry_run: bool) -> Result<CommandOutput, BackendError>;
}

/// Package registry queries
#[async_trait]
pub trait Registry: Send + Sync {
    /// Whether `name@version` can be resolved from the registry
    async fn is_available(&self, name: &str, version: &str) -> Result<bool, BackendError>;

    /// SHA-256 digests the registry reports, keyed by artifact file name
    async fn checksums(&self, name: &str, version: &str) -> Result<BTreeMap<String, String>, BackendError>;
}

/// Code-hosting platform release API
#[async_trait]
pub trait Forge: Send + Sync {
    /// Whether the forge can be used (credentials present, reachable)
    async fn is_available(&self) -> bool;

    /// Create a release, returning its URL
    async fn create_release(&self, request: &ReleaseRequest, dry_run: bool) -> Result<String, BackendError>;

    /// Delete the release attached to `tag`
    async fn delete_release(&self, tag: &str, dry_run: bool) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_text_prefers_stderr() {
        let mut output = CommandOutput::failure("git push", "  rejected \n");
        assert_eq!(output.error_text(), "rejected");

        output.stderr.clear();
        output.stdout = "only stdout".to_string();
        assert_eq!(output.error_text(), "only stdout");
    }

    #[test]
    fn pinned_manifest_restores_original() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Cargo.toml");
        std::fs::write(&path, "edited").expect("write");

        let pinned = PinnedManifest::rewritten(&path, "original".to_string());
        pinned.restore().expect("restore");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "original");

        let untouched = PinnedManifest::untouched(&path);
        assert!(!untouched.is_rewritten());
        untouched.restore().expect("noop restore");
    }
}
