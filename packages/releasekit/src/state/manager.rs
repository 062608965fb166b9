//! Atomic persistence of the run state file.

use crate::error::{Result, StateError};
use crate::state::RunState;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const STATE_FILE_STEM: &str = ".releasekit-state";

/// Location of the state file for a workspace
///
/// `<root>/.releasekit-state.json`, or `<root>/.releasekit-state--<label>.json`
/// for a labelled workspace.
pub fn state_file_path(workspace_root: &Path, label: &str) -> PathBuf {
    if label.is_empty() {
        workspace_root.join(format!("{}.json", STATE_FILE_STEM))
    } else {
        workspace_root.join(format!("{}--{}.json", STATE_FILE_STEM, label))
    }
}

/// Reads and writes one run state file
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Path to state file
    state_file_path: PathBuf,
}

impl StateManager {
    /// Manage the state file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            state_file_path: path.as_ref().to_path_buf(),
        }
    }

    /// Manage the state file of a (possibly labelled) workspace
    pub fn for_workspace(workspace_root: &Path, label: &str) -> Self {
        Self::new(state_file_path(workspace_root, label))
    }

    /// Path of the managed file
    pub fn path(&self) -> &Path {
        &self.state_file_path
    }

    /// Check if the state file exists
    pub fn exists(&self) -> bool {
        self.state_file_path.exists()
    }

    /// Write the state, replacing the file atomically
    pub fn save(&self, state: &RunState) -> Result<()> {
        let serialized = serde_json::to_string_pretty(state).map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to serialize state: {}", e),
        })?;

        // Write to temporary file first (atomic operation)
        let temp_file_path = self.state_file_path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&temp_file_path).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to create temp file: {}", e),
            })?;

            file.write_all(serialized.as_bytes())
                .map_err(|e| StateError::SaveFailed {
                    reason: format!("Failed to write state: {}", e),
                })?;

            file.sync_all().map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to sync file: {}", e),
            })?;
        }

        fs::rename(&temp_file_path, &self.state_file_path).map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to rename temp file: {}", e),
        })?;

        log::debug!("Saved run state to {}", self.state_file_path.display());
        Ok(())
    }

    /// Read and validate the state file
    pub fn load(&self) -> Result<RunState> {
        if !self.exists() {
            return Err(StateError::NotFound {
                path: self.state_file_path.clone(),
            }
            .into());
        }

        let content = fs::read_to_string(&self.state_file_path)?;
        let state: RunState = serde_json::from_str(&content).map_err(|e| StateError::Corrupted {
            reason: format!("Failed to parse {}: {}", self.state_file_path.display(), e),
        })?;
        state.validate()?;
        Ok(state)
    }

    /// Read the state file when there is one
    pub fn load_if_exists(&self) -> Result<Option<RunState>> {
        if self.exists() {
            self.load().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Remove the state file
    pub fn clear(&self) -> Result<()> {
        if self.exists() {
            fs::remove_file(&self.state_file_path).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to remove state file: {}", e),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::Stage;

    #[test]
    fn file_name_honours_label() {
        let root = Path::new("/ws");
        assert_eq!(state_file_path(root, ""), Path::new("/ws/.releasekit-state.json"));
        assert_eq!(
            state_file_path(root, "py"),
            Path::new("/ws/.releasekit-state--py.json")
        );
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = StateManager::for_workspace(dir.path(), "js");
        let mut state = RunState::new("abc", "js");
        state.track("core", 0, "0.2.0");
        state.set_stage("core", Stage::Done);
        state.mark_published("core");

        manager.save(&state).expect("save");
        assert!(manager.exists());
        assert!(!dir.path().join(".releasekit-state--js.json.tmp").exists());
        assert_eq!(manager.load().expect("load"), state);

        manager.clear().expect("clear");
        assert!(manager.load_if_exists().expect("load").is_none());
    }

    #[test]
    fn corrupted_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = StateManager::for_workspace(dir.path(), "");
        std::fs::write(manager.path(), "{not json").expect("write");
        let err = manager.load().unwrap_err();
        assert!(err.to_string().contains("corrupted"));
    }
}
