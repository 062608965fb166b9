//! Workspace package snapshot.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// A single workspace member as reported by the discovery layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Name as declared in the package manifest; this is the spelling the
    /// registry serves, see [`Package::key`] for comparisons
    pub name: String,
    /// Current version on disk
    pub version: String,
    /// Package directory
    pub path: PathBuf,
    /// Path to the package manifest (Cargo.toml, pyproject.toml, ...)
    pub manifest_path: PathBuf,
    /// Names of other workspace packages this one depends on
    #[serde(default)]
    pub internal_deps: BTreeSet<String>,
    /// Names of dependencies resolved from a registry
    #[serde(default)]
    pub external_deps: BTreeSet<String>,
    /// Raw dependency specifiers keyed by name, as written in the manifest
    #[serde(default)]
    pub all_deps: BTreeMap<String, String>,
    /// Whether the package may be uploaded to a registry
    #[serde(default = "default_publishable")]
    pub is_publishable: bool,
}

fn default_publishable() -> bool {
    true
}

impl Package {
    /// Create a publishable package with no dependencies
    ///
    /// The manifest path defaults to `<path>/Cargo.toml`.
    pub fn new(name: &str, version: &str, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: name.trim().to_string(),
            version: version.to_string(),
            manifest_path: path.join("Cargo.toml"),
            path,
            internal_deps: BTreeSet::new(),
            external_deps: BTreeSet::new(),
            all_deps: BTreeMap::new(),
            is_publishable: true,
        }
    }

    /// Normalized, workspace-unique key used by the graph and manifest
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }

    /// Add internal (workspace) dependencies
    pub fn with_internal_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for dep in deps {
            let dep = normalize_name(dep.as_ref());
            self.all_deps.entry(dep.clone()).or_insert_with(|| "*".to_string());
            self.internal_deps.insert(dep);
        }
        self
    }

    /// Add an external (registry) dependency with its raw specifier
    pub fn with_external_dep(mut self, name: &str, spec: &str) -> Self {
        let name = normalize_name(name);
        self.all_deps.insert(name.clone(), spec.to_string());
        self.external_deps.insert(name);
        self
    }

    /// Mark the package as private / not uploadable
    pub fn unpublishable(mut self) -> Self {
        self.is_publishable = false;
        self
    }
}

/// Normalize a package name for workspace-wide comparison
///
/// Lowercases and maps `_` and `.` to `-`, so `My_Pkg` and `my-pkg` collide.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '_' | '.' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}
