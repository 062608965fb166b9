//! Resumable snapshot of a publish run.

use crate::error::{Result, StateError};
use crate::publish::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current version of the state format (for migration)
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Progress of a single package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageProgress {
    /// Graph level the package belongs to
    pub level: usize,
    /// Version being published
    pub version: String,
    /// Last stage reached
    pub stage: Stage,
    /// Failure message, when the package failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Snapshot of a publish run, rewritten after every level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Version of the state format
    pub format_version: u32,
    /// Commit the release manifest was computed from
    pub git_sha: String,
    /// Workspace label, empty for the default workspace
    #[serde(default)]
    pub label: String,
    /// Whether the run was a dry run; such states are never resumed from
    #[serde(default)]
    pub dry_run: bool,
    /// Timestamp when the run started
    pub started_at: DateTime<Utc>,
    /// Timestamp of the last update
    pub updated_at: DateTime<Utc>,
    /// Last level that finished
    pub current_level: usize,
    /// Per-package progress
    pub packages: BTreeMap<String, PackageProgress>,
    /// Packages published
    pub published: Vec<String>,
    /// Packages not published by design
    pub skipped: Vec<String>,
    /// Packages that failed, with the reason
    pub failed: BTreeMap<String, String>,
}

impl RunState {
    /// Fresh state for a run
    pub fn new(git_sha: &str, label: &str) -> Self {
        let now = Utc::now();
        Self {
            format_version: STATE_FORMAT_VERSION,
            git_sha: git_sha.to_string(),
            label: label.to_string(),
            dry_run: false,
            started_at: now,
            updated_at: now,
            current_level: 0,
            packages: BTreeMap::new(),
            published: Vec::new(),
            skipped: Vec::new(),
            failed: BTreeMap::new(),
        }
    }

    /// Mark the state as produced by a dry run
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether a new run of `git_sha` may pick up where this state left off
    pub fn resumable_for(&self, git_sha: &str) -> bool {
        !self.dry_run && !git_sha.is_empty() && self.git_sha == git_sha
    }

    /// Start tracking a package
    pub fn track(&mut self, name: &str, level: usize, version: &str) {
        self.packages.insert(
            name.to_string(),
            PackageProgress {
                level,
                version: version.to_string(),
                stage: Stage::Pending,
                error: None,
            },
        );
    }

    /// Record the last stage a package reached
    pub fn set_stage(&mut self, name: &str, stage: Stage) {
        if let Some(progress) = self.packages.get_mut(name) {
            progress.stage = stage;
        }
        self.touch();
    }

    /// Record a publish
    pub fn mark_published(&mut self, name: &str) {
        if !self.published.iter().any(|p| p == name) {
            self.published.push(name.to_string());
        }
        self.touch();
    }

    /// Record a package left out of the run
    pub fn mark_skipped(&mut self, name: &str) {
        if !self.skipped.iter().any(|p| p == name) {
            self.skipped.push(name.to_string());
        }
        self.touch();
    }

    /// Record a failure
    pub fn mark_failed(&mut self, name: &str, message: &str) {
        if let Some(progress) = self.packages.get_mut(name) {
            progress.stage = Stage::Failed;
            progress.error = Some(message.to_string());
        }
        self.failed.insert(name.to_string(), message.to_string());
        self.touch();
    }

    /// Record that a level finished
    pub fn complete_level(&mut self, level: usize) {
        self.current_level = level;
        self.touch();
    }

    /// Whether a package finished publishing in this state
    pub fn is_done(&self, name: &str, version: &str) -> bool {
        self.packages
            .get(name)
            .is_some_and(|p| p.version == version && matches!(p.stage, Stage::Done | Stage::Skipped))
    }

    /// Check the snapshot was written by a compatible version
    pub fn validate(&self) -> Result<()> {
        if self.format_version != STATE_FORMAT_VERSION {
            return Err(StateError::VersionMismatch {
                expected: STATE_FORMAT_VERSION,
                found: self.format_version,
            }
            .into());
        }
        if let Some(name) = self.failed.keys().find(|name| self.published.contains(name)) {
            return Err(StateError::Corrupted {
                reason: format!("'{}' is recorded as both published and failed", name),
            }
            .into());
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
