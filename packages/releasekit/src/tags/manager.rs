//! Tag manager for coordinating release tags and platform releases.
//!
//! Tags are created sequentially, skipping any that already exist, and the
//! new ones are pushed in a single batched call. A push failure is the only
//! error that escapes; everything else ends up in the result.

use crate::backends::{Forge, ReleaseRequest, Vcs};
use crate::error::TagError;
use crate::tags::format::{format_tag, DEFAULT_TAG_FORMAT, DEFAULT_UMBRELLA_FORMAT};
use crate::tags::release_body::render_release_body;
use crate::version::ReleaseManifest;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// How the platform release is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseMode {
    /// Publish the release immediately with rendered notes
    #[default]
    Local,
    /// Create a draft with the manifest attached, promoted by a later job
    Ci,
}

impl fmt::Display for ReleaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseMode::Local => f.write_str("local"),
            ReleaseMode::Ci => f.write_str("ci"),
        }
    }
}

impl FromStr for ReleaseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(ReleaseMode::Local),
            "ci" => Ok(ReleaseMode::Ci),
            other => Err(format!("unknown release mode '{}', expected 'local' or 'ci'", other)),
        }
    }
}

/// Configuration for tag operations
#[derive(Debug, Clone)]
pub struct TagConfig {
    /// Per-package tag template
    pub tag_format: String,
    /// Umbrella tag template, used when the manifest carries none
    pub umbrella_format: String,
    /// Optional second per-package template for dual tagging
    pub secondary_format: Option<String>,
    /// Value substituted for `{label}`
    pub label: String,
    /// Remote to push to and delete from
    pub remote: String,
    /// Platform release mode
    pub mode: ReleaseMode,
    /// Provenance file attached to CI draft releases
    pub provenance: Option<PathBuf>,
    /// Log instead of mutating anything
    pub dry_run: bool,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            tag_format: DEFAULT_TAG_FORMAT.to_string(),
            umbrella_format: DEFAULT_UMBRELLA_FORMAT.to_string(),
            secondary_format: None,
            label: String::new(),
            remote: "origin".to_string(),
            mode: ReleaseMode::Local,
            provenance: None,
            dry_run: false,
        }
    }
}

/// Outcome of [`TagManager::create_tags`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagResult {
    created: Vec<String>,
    skipped: Vec<String>,
    failed: BTreeMap<String, String>,
    pushed: bool,
    release_url: Option<String>,
}

impl TagResult {
    /// Start accumulating a result
    pub fn builder() -> TagResultBuilder {
        TagResultBuilder::default()
    }

    /// Tags created by this run, in creation order
    pub fn created(&self) -> &[String] {
        &self.created
    }

    /// Tags that already existed
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Tags that could not be created, with the reason
    pub fn failed(&self) -> &BTreeMap<String, String> {
        &self.failed
    }

    /// Whether the created tags reached the remote
    pub fn pushed(&self) -> bool {
        self.pushed
    }

    /// URL of the platform release, when one was created
    pub fn release_url(&self) -> Option<&str> {
        self.release_url.as_deref()
    }

    /// True when no tag failed
    pub fn ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Accumulates a [`TagResult`] while side effects happen
#[derive(Debug, Default)]
pub struct TagResultBuilder {
    result: TagResult,
}

impl TagResultBuilder {
    /// Record a newly created tag
    pub fn created(&mut self, tag: impl Into<String>) -> &mut Self {
        self.result.created.push(tag.into());
        self
    }

    /// Record a tag that already existed
    pub fn skipped(&mut self, tag: impl Into<String>) -> &mut Self {
        self.result.skipped.push(tag.into());
        self
    }

    /// Record a tag failure
    pub fn failed(&mut self, tag: impl Into<String>, reason: impl Into<String>) -> &mut Self {
        self.result.failed.insert(tag.into(), reason.into());
        self
    }

    /// Mark the batched push as verified
    pub fn pushed(&mut self) -> &mut Self {
        self.result.pushed = true;
        self
    }

    /// Record the created platform release
    pub fn release_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.result.release_url = Some(url.into());
        self
    }

    /// Tags created so far
    pub fn created_tags(&self) -> &[String] {
        &self.result.created
    }

    /// Whether any tag failed so far
    pub fn has_failures(&self) -> bool {
        !self.result.failed.is_empty()
    }

    /// Freeze the result
    pub fn build(self) -> TagResult {
        self.result
    }
}

/// Outcome of [`TagManager::delete_tags`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteResult {
    /// Tags removed locally and from the remote
    pub deleted: Vec<String>,
    /// Tags that did not exist
    pub skipped: Vec<String>,
    /// Tags that could not be removed, with the reason
    pub failed: BTreeMap<String, String>,
    /// Whether the platform release was removed
    pub release_deleted: bool,
}

impl DeleteResult {
    /// True when nothing failed
    pub fn ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Creates and rolls back release tags
pub struct TagManager {
    vcs: Arc<dyn Vcs>,
    forge: Option<Arc<dyn Forge>>,
    config: TagConfig,
}

impl TagManager {
    /// Create a tag manager without a forge
    pub fn new(vcs: Arc<dyn Vcs>, config: TagConfig) -> Self {
        Self {
            vcs,
            forge: None,
            config,
        }
    }

    /// Attach a forge for platform releases
    pub fn with_forge(mut self, forge: Arc<dyn Forge>) -> Self {
        self.forge = Some(forge);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &TagConfig {
        &self.config
    }

    /// Umbrella tag for a manifest: the manifest's own, or the umbrella
    /// template applied to the highest bumped version
    pub fn umbrella_tag(&self, manifest: &ReleaseManifest) -> Option<String> {
        if !manifest.umbrella_tag().is_empty() {
            return Some(manifest.umbrella_tag().to_string());
        }
        manifest
            .highest_bumped_version()
            .map(|version| format_tag(&self.config.umbrella_format, "", &version.to_string(), &self.config.label))
    }

    /// Every tag a manifest maps to, with its annotation message, deduplicated
    fn planned_tags(&self, manifest: &ReleaseManifest) -> Vec<(String, String)> {
        let mut seen = BTreeSet::new();
        let mut planned = Vec::new();
        let mut plan = |tag: String, message: String| {
            if seen.insert(tag.clone()) {
                planned.push((tag, message));
            }
        };

        for package in manifest.bumped() {
            let message = format!("Release {} v{}", package.name(), package.new_version());
            let primary = format_tag(
                &self.config.tag_format,
                package.name(),
                package.new_version(),
                &self.config.label,
            );
            plan(primary.clone(), message.clone());

            if let Some(secondary_format) = &self.config.secondary_format {
                let secondary = format_tag(
                    secondary_format,
                    package.name(),
                    package.new_version(),
                    &self.config.label,
                );
                if secondary != primary {
                    plan(secondary, message);
                }
            }
        }

        if let Some(umbrella) = self.umbrella_tag(manifest) {
            let message = format!("Release {}", umbrella);
            plan(umbrella, message);
        }

        planned
    }

    /// Create per-package and umbrella tags, push them, and create the
    /// platform release
    ///
    /// Returns `Err` only when the batched push fails.
    pub async fn create_tags(&self, manifest: &ReleaseManifest) -> Result<TagResult, TagError> {
        let mut builder = TagResult::builder();
        if manifest.is_empty_release() {
            log::info!("No bumped packages; nothing to tag");
            return Ok(builder.build());
        }

        for (tag, message) in self.planned_tags(manifest) {
            match self.vcs.tag_exists(&tag).await {
                Ok(true) => {
                    log::info!("Tag {} already exists, skipping", tag);
                    builder.skipped(tag);
                }
                Ok(false) => match self.vcs.tag(&tag, &message, self.config.dry_run).await {
                    Ok(()) => {
                        log::info!("Created tag {}", tag);
                        builder.created(tag);
                    }
                    Err(e) => {
                        log::error!("Failed to create tag {}: {}", tag, e);
                        builder.failed(tag, e.to_string());
                    }
                },
                Err(e) => {
                    log::error!("Failed to check tag {}: {}", tag, e);
                    builder.failed(tag, e.to_string());
                }
            }
        }

        if builder.has_failures() {
            log::warn!("Not pushing: some tags failed to be created");
        } else if !builder.created_tags().is_empty() {
            self.push_created(&mut builder).await?;
        }

        if !builder.has_failures() {
            self.create_release(manifest, &mut builder).await;
        }

        Ok(builder.build())
    }

    async fn push_created(&self, builder: &mut TagResultBuilder) -> Result<(), TagError> {
        let tags = builder.created_tags().to_vec();
        let remote = &self.config.remote;
        let failure = |reason: String| TagError::PushFailed {
            remote: remote.clone(),
            tags: tags.clone(),
            reason,
        };

        let output = self
            .vcs
            .push(&tags, remote, self.config.dry_run)
            .await
            .map_err(|e| failure(e.to_string()))?;
        if !output.ok {
            return Err(failure(output.error_text()));
        }

        if self.config.dry_run {
            log::info!("[dry-run] would push {} tag(s) to {}", tags.len(), remote);
        } else {
            log::info!("Pushed {} tag(s) to {}", tags.len(), remote);
            builder.pushed();
        }
        Ok(())
    }

    /// Best-effort platform release; failures are logged and swallowed
    async fn create_release(&self, manifest: &ReleaseManifest, builder: &mut TagResultBuilder) {
        let Some(forge) = &self.forge else {
            return;
        };
        if !forge.is_available().await {
            log::info!("Forge not available; skipping platform release");
            return;
        }
        let Some(tag) = self.umbrella_tag(manifest) else {
            return;
        };
        if !builder.created_tags().contains(&tag) {
            log::info!("Umbrella tag {} already existed; not creating another release", tag);
            return;
        }

        // Keeps the attached manifest alive until the upload finishes
        let staging = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                log::warn!("Skipping platform release: cannot create staging dir: {}", e);
                return;
            }
        };

        let draft = self.config.mode == ReleaseMode::Ci;
        let assets = if draft {
            match self.release_assets(manifest, staging.path()) {
                Ok(assets) => assets,
                Err(reason) => {
                    log::warn!("Skipping platform release: {}", reason);
                    return;
                }
            }
        } else {
            Vec::new()
        };

        let request = ReleaseRequest {
            tag: tag.clone(),
            title: tag.clone(),
            body: render_release_body(manifest, &tag),
            draft,
            prerelease: manifest.bumped().any(|p| p.is_prerelease()),
            assets,
        };

        match forge.create_release(&request, self.config.dry_run).await {
            Ok(url) => {
                log::info!("Created {} release {}", if draft { "draft" } else { "published" }, url);
                builder.release_url(url);
            }
            Err(e) => log::warn!("Platform release for {} failed (tags are authoritative): {}", tag, e),
        }
    }

    fn release_assets(&self, manifest: &ReleaseManifest, staging: &Path) -> Result<Vec<PathBuf>, String> {
        let manifest_path = staging.join("release-manifest.json");
        let json = manifest.to_json_pretty().map_err(|e| e.to_string())?;
        std::fs::write(&manifest_path, json).map_err(|e| format!("cannot stage manifest: {}", e))?;

        let mut assets = vec![manifest_path];
        if let Some(provenance) = &self.config.provenance {
            if provenance.is_file() {
                assets.push(provenance.clone());
            } else {
                log::warn!("Provenance file {} not found; not attaching", provenance.display());
            }
        }
        Ok(assets)
    }

    /// Remove the tags and platform release a manifest maps to
    pub async fn delete_tags(&self, manifest: &ReleaseManifest) -> DeleteResult {
        let mut result = DeleteResult::default();
        let remote = Some(self.config.remote.as_str());

        for (tag, _) in self.planned_tags(manifest) {
            match self.vcs.tag_exists(&tag).await {
                Ok(false) => {
                    log::info!("Tag {} does not exist, skipping", tag);
                    result.skipped.push(tag);
                }
                Ok(true) => match self.vcs.delete_tag(&tag, remote, self.config.dry_run).await {
                    Ok(()) => {
                        log::info!("Deleted tag {}", tag);
                        result.deleted.push(tag);
                    }
                    Err(e) => {
                        log::error!("Failed to delete tag {}: {}", tag, e);
                        result.failed.insert(tag, e.to_string());
                    }
                },
                Err(e) => {
                    result.failed.insert(tag, e.to_string());
                }
            }
        }

        if let (Some(forge), Some(tag)) = (&self.forge, self.umbrella_tag(manifest)) {
            if forge.is_available().await {
                match forge.delete_release(&tag, self.config.dry_run).await {
                    Ok(()) => result.release_deleted = true,
                    Err(e) => log::warn!("Failed to delete platform release {}: {}", tag, e),
                }
            }
        }

        result
    }
}

impl fmt::Debug for TagManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagManager")
            .field("config", &self.config)
            .field("has_forge", &self.forge.is_some())
            .finish()
    }
}
