//! Cargo package-manager backend.
//!
//! Builds `.crate` archives with `cargo package`, uploads with
//! `cargo publish`, and smoke-tests by resolving the freshly published
//! version from a scratch project.

use crate::backends::process::{require_tool, run_command};
use crate::backends::{CommandOutput, PackageManager, PinnedManifest};
use crate::error::BackendError;
use crate::version::TomlEditor;
use crate::workspace::Package;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Markers in `cargo publish` stderr that indicate a retryable failure
const TRANSIENT_MARKERS: [&str; 6] = [
    "rate limit",
    "too many requests",
    "429",
    "timed out",
    "connection reset",
    "failed to connect",
];

/// Package manager backend for Rust crates
#[derive(Debug, Clone)]
pub struct CargoBackend {
    /// Timeout for individual cargo invocations
    operation_timeout: Duration,
}

impl CargoBackend {
    /// Create a cargo backend, checking that cargo is installed
    pub fn new() -> Result<Self, BackendError> {
        require_tool("cargo")?;
        Ok(Self {
            operation_timeout: Duration::from_secs(300),
        })
    }

    /// Override the per-command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Move packaged `.crate` files from cargo's target dir into `output_dir`
    fn collect_crates(target_package_dir: &Path, output_dir: &Path) -> Result<usize, BackendError> {
        let entries = match std::fs::read_dir(target_package_dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(0),
        };

        let mut moved = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("crate") {
                continue;
            }
            let Some(file_name) = path.file_name() else {
                continue;
            };
            std::fs::rename(&path, output_dir.join(file_name)).map_err(|e| BackendError::CommandFailed {
                command: "collect packaged crates".to_string(),
                reason: e.to_string(),
            })?;
            moved += 1;
        }
        Ok(moved)
    }

    fn is_transient(stderr: &str) -> bool {
        let lower = stderr.to_lowercase();
        TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
    }

    fn is_already_uploaded(stderr: &str) -> bool {
        let lower = stderr.to_lowercase();
        lower.contains("already uploaded") || lower.contains("already exists")
    }
}

#[async_trait]
impl PackageManager for CargoBackend {
    async fn pin_versions(
        &self,
        package: &Package,
        own_version: &str,
        dependencies: &BTreeMap<String, String>,
        dry_run: bool,
    ) -> Result<PinnedManifest, BackendError> {
        if dry_run {
            log::info!(
                "[dry-run] would pin {} to {} ({} internal deps)",
                package.manifest_path.display(),
                own_version,
                dependencies.len()
            );
            return Ok(PinnedManifest::untouched(&package.manifest_path));
        }

        let mut editor = TomlEditor::open(&package.manifest_path)?;
        editor.apply_pins(own_version, dependencies)?;
        editor.save()?;
        Ok(PinnedManifest::rewritten(
            &package.manifest_path,
            editor.original_content().to_string(),
        ))
    }

    async fn build(&self, package_dir: &Path, output_dir: &Path, dry_run: bool) -> Result<CommandOutput, BackendError> {
        let manifest = package_dir.join("Cargo.toml").to_string_lossy().into_owned();
        let target_dir = output_dir.join("target");
        let target = target_dir.to_string_lossy().into_owned();
        let args = [
            "package",
            "--manifest-path",
            manifest.as_str(),
            "--no-verify",
            "--allow-dirty",
            "--target-dir",
            target.as_str(),
        ];

        if dry_run {
            log::info!("[dry-run] cargo {}", args.join(" "));
            return Ok(CommandOutput::success(format!("cargo {}", args.join(" "))));
        }

        let output = run_command("cargo", &args, package_dir, self.operation_timeout).await?;
        if output.ok {
            let moved = Self::collect_crates(&target_dir.join("package"), output_dir)?;
            log::debug!("collected {} crate archive(s) into {}", moved, output_dir.display());
        }
        Ok(output)
    }

    async fn publish(
        &self,
        package: &Package,
        artifacts: &[PathBuf],
        index_url: Option<&str>,
        dry_run: bool,
    ) -> Result<CommandOutput, BackendError> {
        let manifest = package.manifest_path.to_string_lossy().into_owned();
        let mut args = vec![
            "publish",
            "--manifest-path",
            manifest.as_str(),
            "--no-verify",
            "--allow-dirty",
        ];
        if let Some(index) = index_url {
            args.push("--index");
            args.push(index);
        }

        if dry_run {
            log::info!("[dry-run] cargo {} ({} artifact(s))", args.join(" "), artifacts.len());
            return Ok(CommandOutput::success(format!("cargo {}", args.join(" "))));
        }

        let output = run_command("cargo", &args, &package.path, self.operation_timeout).await?;
        if output.ok {
            return Ok(output);
        }

        let text = output.error_text();
        if Self::is_already_uploaded(&text) {
            log::warn!("{} {} was already uploaded; treating as published", package.name, package.version);
            return Ok(CommandOutput { ok: true, ..output });
        }
        if Self::is_transient(&text) {
            return Err(BackendError::Transient { reason: text });
        }
        Ok(output)
    }

    async fn smoke_test(&self, name: &str, version: &str, dry_run: bool) -> Result<CommandOutput, BackendError> {
        if dry_run {
            log::info!("[dry-run] would resolve {} ={} from a scratch project", name, version);
            return Ok(CommandOutput::success(format!("smoke-test {}@{}", name, version)));
        }

        let scratch = tempfile::tempdir().map_err(|e| BackendError::CommandFailed {
            command: "create smoke-test project".to_string(),
            reason: e.to_string(),
        })?;
        let manifest = format!(
            "[package]\nname = \"releasekit-smoke\"\nversion = \"0.0.0\"\nedition = \"2021\"\npublish = false\n\n[dependencies]\n{} = \"={}\"\n",
            name, version
        );
        let write = |path: PathBuf, content: &str| {
            std::fs::write(&path, content).map_err(|e| BackendError::CommandFailed {
                command: format!("write {}", path.display()),
                reason: e.to_string(),
            })
        };
        write(scratch.path().join("Cargo.toml"), &manifest)?;
        std::fs::create_dir_all(scratch.path().join("src")).map_err(|e| BackendError::CommandFailed {
            command: "create smoke-test src".to_string(),
            reason: e.to_string(),
        })?;
        write(scratch.path().join("src").join("lib.rs"), "")?;

        run_command("cargo", &["fetch"], scratch.path(), self.operation_timeout).await
    }
}
