//! Outcome of a publish run.

use crate::state::RunState;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// What a publish run achieved
#[derive(Debug, Clone, PartialEq)]
pub struct PublishResult {
    /// Packages published (or found already published), in completion order
    pub published: Vec<String>,
    /// Packages not published by design
    pub skipped: Vec<String>,
    /// Packages that failed, with the reason
    pub failed: BTreeMap<String, String>,
    /// Final run state
    pub state: Option<RunState>,
    /// Where the run state was persisted
    pub state_path: Option<PathBuf>,
}

impl PublishResult {
    /// Result of a run that had nothing to publish
    pub fn empty(skipped: Vec<String>) -> Self {
        Self {
            published: Vec::new(),
            skipped,
            failed: BTreeMap::new(),
            state: None,
            state_path: None,
        }
    }

    /// True when no package failed
    pub fn ok(&self) -> bool {
        self.failed.is_empty()
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} published, {} skipped, {} failed",
            self.published.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}
