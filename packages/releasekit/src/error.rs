//! Error types for releasekit operations.
//!
//! Fatal configuration problems surface as [`ReleaseError`] before any publish
//! attempt. Per-package failures never use this type at the orchestrator
//! boundary; they are recorded as data in [`crate::publish::PublishResult`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for releasekit operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all releasekit operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Dependency graph construction errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Release manifest errors
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Publishing errors
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Tagging errors
    #[error("Tag error: {0}")]
    Tag(#[from] TagError),

    /// State persistence errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Backend (git, package manager, registry, forge) errors
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Dependency graph errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A package references an internal dependency that is not in the workspace
    #[error("Package '{package}' depends on unknown workspace package '{dependency}'")]
    UnknownDependency {
        /// Package declaring the dependency
        package: String,
        /// Name that did not resolve
        dependency: String,
    },

    /// Two packages normalize to the same name
    #[error("Duplicate package name '{name}' in workspace")]
    DuplicatePackage {
        /// Normalized name that appeared twice
        name: String,
    },

    /// The internal dependency graph contains a cycle
    #[error("Circular dependency detected among packages: {}", packages.join(", "))]
    CircularDependency {
        /// Packages that could not be assigned a level
        packages: Vec<String>,
    },
}

/// Release manifest errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// A manifest entry violates `skipped <=> bump == none`
    #[error("Manifest entry '{package}' is inconsistent: skipped={skipped} but bump={bump}")]
    InconsistentSkip {
        /// Package name of the entry
        package: String,
        /// Recorded skipped flag
        skipped: bool,
        /// Recorded bump kind
        bump: String,
    },

    /// A version string could not be parsed
    #[error("Invalid version '{version}' for '{package}': {source}")]
    InvalidVersion {
        /// Package name of the entry
        package: String,
        /// The offending version string
        version: String,
        /// Underlying semver error
        #[source]
        source: semver::Error,
    },

    /// Manifest file could not be read or written
    #[error("Failed to access manifest at {path}: {reason}")]
    Io {
        /// Manifest path
        path: PathBuf,
        /// Reason for the failure
        reason: String,
    },
}

/// Publishing errors
///
/// Only [`PublishError::UnknownPackage`] escapes the orchestrator; the rest
/// describe per-package failures and end up as messages in the result.
#[derive(Error, Debug)]
pub enum PublishError {
    /// A bumped manifest entry names a package missing from the workspace
    #[error("Manifest references unknown package '{package}'")]
    UnknownPackage {
        /// Package name from the manifest
        package: String,
    },

    /// The build step produced no artifacts
    #[error("No distribution files produced for '{package}'")]
    NoArtifacts {
        /// Package that was built
        package: String,
    },

    /// A registry digest disagreed with the locally computed one
    #[error("Checksum verification failed for '{package}': {}", mismatched.join(", "))]
    ChecksumMismatch {
        /// Package being verified
        package: String,
        /// Artifact file names whose digests differ
        mismatched: Vec<String>,
    },

    /// The registry reported digests, but none for the built artifacts
    #[error("Checksum verification failed for '{package}': registry has no digest for {}", artifacts.join(", "))]
    ChecksumUnverified {
        /// Package being verified
        package: String,
        /// Local artifact file names left unchecked
        artifacts: Vec<String>,
    },

    /// The registry never reported the version within the poll budget
    #[error("Timed out after {timeout_secs}s waiting for '{package}' {version} to appear on the registry")]
    PollTimeout {
        /// Package being polled
        package: String,
        /// Version being polled
        version: String,
        /// Poll budget in seconds
        timeout_secs: u64,
    },

    /// A package-manager step reported failure
    #[error("{step} failed for '{package}': {reason}")]
    StepFailed {
        /// Stage that failed
        step: String,
        /// Package name
        package: String,
        /// Captured output or reason
        reason: String,
    },

    /// Task panicked or was otherwise lost
    #[error("Unexpected failure publishing '{package}': {reason}")]
    Unexpected {
        /// Package name
        package: String,
        /// Description of what went wrong
        reason: String,
    },
}

/// Tagging errors
#[derive(Error, Debug)]
pub enum TagError {
    /// Pushing the created tags to the remote failed
    ///
    /// Tags exist locally but are not visible remotely.
    #[error("Failed to push tags {} to '{remote}': {reason}", tags.join(", "))]
    PushFailed {
        /// Remote name
        remote: String,
        /// Tags that were meant to be pushed
        tags: Vec<String>,
        /// Reason reported by the VCS
        reason: String,
    },
}

/// State persistence errors
#[derive(Error, Debug)]
pub enum StateError {
    /// State file corrupted
    #[error("State file corrupted: {reason}")]
    Corrupted {
        /// Reason for state corruption
        reason: String,
    },

    /// State file not found
    #[error("State file not found at {path}")]
    NotFound {
        /// Expected location
        path: PathBuf,
    },

    /// State format version mismatch
    #[error("State file version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state file version
        expected: u32,
        /// Actual state file version found
        found: u32,
    },

    /// Failed to save state
    #[error("Failed to save state: {reason}")]
    SaveFailed {
        /// Reason for save failure
        reason: String,
    },
}

/// Backend errors raised by VCS, package manager, registry and forge implementations
#[derive(Error, Debug)]
pub enum BackendError {
    /// A required executable is not on PATH
    #[error("Required tool '{tool}' not found on PATH")]
    ToolNotFound {
        /// Executable name
        tool: String,
    },

    /// A spawned command could not be executed or failed
    #[error("Command '{command}' failed: {reason}")]
    CommandFailed {
        /// Command line that was run
        command: String,
        /// stderr or spawn error
        reason: String,
    },

    /// An HTTP request failed
    #[error("HTTP request to {url} failed: {reason}")]
    Http {
        /// Request URL
        url: String,
        /// Reason for the failure
        reason: String,
    },

    /// A remote answered with something we could not interpret
    #[error("Unexpected response from {service}: {reason}")]
    UnexpectedResponse {
        /// Service name
        service: String,
        /// What was wrong
        reason: String,
    },

    /// Manifest pinning failed
    #[error("Failed to pin versions in {path}: {reason}")]
    PinFailed {
        /// Manifest path
        path: PathBuf,
        /// Reason for the failure
        reason: String,
    },

    /// Name a registry cannot serve
    #[error("Invalid registry package name '{name}'")]
    InvalidName {
        /// Name as given
        name: String,
    },

    /// Transient failure worth retrying (rate limit, network blip)
    #[error("Transient failure: {reason}")]
    Transient {
        /// Reason for the failure
        reason: String,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason the value is invalid
        reason: String,
    },
}

impl BackendError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient { .. })
    }
}

impl ReleaseError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Graph(GraphError::CircularDependency { packages }) => vec![
                format!("Review dependencies between packages: {}", packages.join(", ")),
                "Remove circular dependencies by restructuring package relationships".to_string(),
            ],
            ReleaseError::Graph(GraphError::UnknownDependency { dependency, .. }) => vec![
                format!("Add '{}' to the workspace snapshot or drop the reference", dependency),
            ],
            ReleaseError::Tag(TagError::PushFailed { remote, tags, .. }) => vec![
                format!("Check push access to remote '{}': git remote -v", remote),
                format!("Push the tags by hand: git push {} {}", remote, tags.join(" ")),
                "Or remove the local tags with: releasekit rollback --manifest <path>".to_string(),
            ],
            ReleaseError::Backend(BackendError::ToolNotFound { tool }) => vec![
                format!("Install '{}' and make sure it is on PATH", tool),
            ],
            ReleaseError::State(StateError::Corrupted { .. }) => vec![
                "Delete the .releasekit-state*.json file and re-run; published packages are detected idempotently".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Check if re-running the same command may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            ReleaseError::Graph(_) => false,
            ReleaseError::Manifest(_) => false,
            ReleaseError::Config(_) => false,
            ReleaseError::Publish(PublishError::UnknownPackage { .. }) => false,
            _ => true,
        }
    }
}
