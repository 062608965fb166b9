//! Workspace snapshot and dependency graph.
//!
//! Discovery of workspace members happens upstream; this module consumes the
//! resulting [`Package`] snapshot and derives publish levels from it.

mod graph;
mod package;

pub use graph::{build_graph, DependencyGraph};
pub use package::{normalize_name, Package};

use crate::error::{ManifestError, Result};
use std::path::Path;

/// Load a workspace snapshot (JSON array of packages) from disk
pub fn load_packages<P: AsRef<Path>>(path: P) -> Result<Vec<Package>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(serde_json::from_str(&content)?)
}
