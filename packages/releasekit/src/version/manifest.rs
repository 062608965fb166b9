//! Release manifest: the per-package version decisions handed to this crate.

use crate::error::{ManifestError, Result};
use crate::tags::{format_tag, DEFAULT_TAG_FORMAT};
use crate::workspace::normalize_name;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Kind of version bump decided for a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    /// Breaking changes
    Major,
    /// New features
    Minor,
    /// Bug fixes
    Patch,
    /// Pre-release increment
    Prerelease,
    /// No release for this package
    None,
}

impl std::fmt::Display for BumpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BumpKind::Major => "major",
            BumpKind::Minor => "minor",
            BumpKind::Patch => "patch",
            BumpKind::Prerelease => "prerelease",
            BumpKind::None => "none",
        };
        f.write_str(s)
    }
}

/// Version decision for a single package
///
/// `skipped` is always equal to `bump == BumpKind::None`; the constructor
/// derives it and deserialization rejects records that disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPackageVersion")]
pub struct PackageVersion {
    name: String,
    old_version: String,
    new_version: String,
    bump: BumpKind,
    reason: String,
    skipped: bool,
    tag: String,
}

#[derive(Deserialize)]
struct RawPackageVersion {
    name: String,
    old_version: String,
    new_version: String,
    bump: BumpKind,
    #[serde(default)]
    reason: String,
    skipped: Option<bool>,
    tag: Option<String>,
}

impl TryFrom<RawPackageVersion> for PackageVersion {
    type Error = ManifestError;

    fn try_from(raw: RawPackageVersion) -> std::result::Result<Self, Self::Error> {
        let expected = raw.bump == BumpKind::None;
        if let Some(skipped) = raw.skipped {
            if skipped != expected {
                return Err(ManifestError::InconsistentSkip {
                    package: raw.name,
                    skipped,
                    bump: raw.bump.to_string(),
                });
            }
        }

        let mut version = PackageVersion::new(
            &raw.name,
            &raw.old_version,
            &raw.new_version,
            raw.bump,
            &raw.reason,
        );
        if let Some(tag) = raw.tag {
            version.tag = tag;
        }
        Ok(version)
    }
}

impl PackageVersion {
    /// Create a version decision; the tag uses the default per-package format
    pub fn new(name: &str, old_version: &str, new_version: &str, bump: BumpKind, reason: &str) -> Self {
        let name = normalize_name(name);
        let tag = format_tag(DEFAULT_TAG_FORMAT, &name, new_version, "");
        Self {
            name,
            old_version: old_version.to_string(),
            new_version: new_version.to_string(),
            bump,
            reason: reason.to_string(),
            skipped: bump == BumpKind::None,
            tag,
        }
    }

    /// Override the precomputed tag string
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    /// Package name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version before the release
    pub fn old_version(&self) -> &str {
        &self.old_version
    }

    /// Version being released
    pub fn new_version(&self) -> &str {
        &self.new_version
    }

    /// Bump kind
    pub fn bump(&self) -> BumpKind {
        self.bump
    }

    /// Human-readable reason for the bump
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Whether this package is left out of the release
    pub fn skipped(&self) -> bool {
        self.skipped
    }

    /// Precomputed per-package tag
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Parsed new version
    pub fn parsed_new_version(&self) -> std::result::Result<Version, ManifestError> {
        Version::parse(&self.new_version).map_err(|e| ManifestError::InvalidVersion {
            package: self.name.clone(),
            version: self.new_version.clone(),
            source: e,
        })
    }

    /// Whether the new version carries a pre-release component
    pub fn is_prerelease(&self) -> bool {
        self.bump == BumpKind::Prerelease
            || Version::parse(&self.new_version)
                .map(|v| !v.pre.is_empty())
                .unwrap_or(false)
    }
}

/// Immutable set of version decisions for one release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    git_sha: String,
    #[serde(default)]
    umbrella_tag: String,
    packages: Vec<PackageVersion>,
}

impl ReleaseManifest {
    /// Create a manifest
    pub fn new(git_sha: &str, umbrella_tag: &str, packages: Vec<PackageVersion>) -> Self {
        Self {
            git_sha: git_sha.to_string(),
            umbrella_tag: umbrella_tag.to_string(),
            packages,
        }
    }

    /// Commit the release was computed from
    pub fn git_sha(&self) -> &str {
        &self.git_sha
    }

    /// Umbrella tag name, empty when it should be derived from the versions
    pub fn umbrella_tag(&self) -> &str {
        &self.umbrella_tag
    }

    /// Every entry, bumped or not
    pub fn packages(&self) -> &[PackageVersion] {
        &self.packages
    }

    /// Entries that are part of the release
    pub fn bumped(&self) -> impl Iterator<Item = &PackageVersion> {
        self.packages.iter().filter(|p| !p.skipped())
    }

    /// Entries left out of the release
    pub fn skipped(&self) -> impl Iterator<Item = &PackageVersion> {
        self.packages.iter().filter(|p| p.skipped())
    }

    /// Look up an entry by (normalized) name
    pub fn get(&self, name: &str) -> Option<&PackageVersion> {
        let name = normalize_name(name);
        self.packages.iter().find(|p| p.name == name)
    }

    /// Whether nothing in the manifest is being released
    pub fn is_empty_release(&self) -> bool {
        self.bumped().next().is_none()
    }

    /// Highest new version among bumped entries
    pub fn highest_bumped_version(&self) -> Option<Version> {
        self.bumped()
            .filter_map(|p| Version::parse(p.new_version()).ok())
            .max()
    }

    /// Pretty JSON rendering of the manifest
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a manifest hand-off artifact
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Persist the manifest as a JSON hand-off artifact
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_pretty()?).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_follows_bump() {
        let bumped = PackageVersion::new("core", "0.1.0", "0.2.0", BumpKind::Minor, "feat: x");
        let idle = PackageVersion::new("cli", "1.0.0", "1.0.0", BumpKind::None, "");

        assert!(!bumped.skipped());
        assert!(idle.skipped());
        assert_eq!(bumped.tag(), "core-v0.2.0");
    }

    #[test]
    fn bumped_and_skipped_partition_the_manifest() {
        let manifest = ReleaseManifest::new(
            "abc123",
            "",
            vec![
                PackageVersion::new("a", "0.1.0", "0.1.1", BumpKind::Patch, "fix"),
                PackageVersion::new("b", "0.1.0", "0.1.0", BumpKind::None, ""),
                PackageVersion::new("c", "1.0.0", "2.0.0", BumpKind::Major, "breaking"),
            ],
        );

        let bumped: Vec<_> = manifest.bumped().map(PackageVersion::name).collect();
        let skipped: Vec<_> = manifest.skipped().map(PackageVersion::name).collect();
        assert_eq!(bumped, vec!["a", "c"]);
        assert_eq!(skipped, vec!["b"]);
        assert_eq!(manifest.highest_bumped_version(), Some(Version::new(2, 0, 0)));
    }

    #[test]
    fn inconsistent_skip_is_rejected() {
        let json = r#"{"name":"a","old_version":"1.0.0","new_version":"1.1.0","bump":"minor","skipped":true}"#;
        let err = serde_json::from_str::<PackageVersion>(json).unwrap_err();
        assert!(err.to_string().contains("inconsistent"));
    }

    #[test]
    fn manifest_json_hand_off() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.json");
        let manifest = ReleaseManifest::new(
            "deadbeef",
            "v0.2.0",
            vec![PackageVersion::new("genkit", "0.1.0", "0.2.0", BumpKind::Minor, "feat")],
        );

        manifest.save(&path).expect("save manifest");
        let loaded = ReleaseManifest::load(&path).expect("load manifest");
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn prerelease_detection() {
        let pre = PackageVersion::new("a", "1.0.0", "1.1.0-rc.1", BumpKind::Minor, "");
        let plain = PackageVersion::new("b", "1.0.0", "1.1.0", BumpKind::Minor, "");
        assert!(pre.is_prerelease());
        assert!(!plain.is_prerelease());
    }
}
